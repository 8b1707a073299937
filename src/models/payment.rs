use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

/// What the gateway handed back for a created transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransactionResult {
    pub redirect_url: Option<Url>,
    pub token: Option<String>,
    pub raw_status: String,
}

/// Enumerated payment state of an order, as relayed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    Pending,
    Paid,
    Voided,
}

impl FinancialStatus {
    /// Maps a gateway `transaction_status` code.
    ///
    /// `settlement` is the only paid code; `deny`, `cancel` and `expire` void the
    /// order; anything else (including `capture` and `authorize`) stays pending.
    pub fn from_gateway_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "settlement" => FinancialStatus::Paid,
            "deny" | "cancel" | "expire" => FinancialStatus::Voided,
            _ => FinancialStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialStatus::Pending => "pending",
            FinancialStatus::Paid => "paid",
            FinancialStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Created,
    AwaitingPayment,
    Paid,
    Voided,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Paid | PaymentState::Voided)
    }

    /// Next state after a gateway notification. Terminal states absorb.
    pub fn apply(self, status: FinancialStatus) -> PaymentState {
        if self.is_terminal() {
            return self;
        }
        match status {
            FinancialStatus::Paid => PaymentState::Paid,
            FinancialStatus::Voided => PaymentState::Voided,
            FinancialStatus::Pending => PaymentState::AwaitingPayment,
        }
    }
}

/// Cache value kept per order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: String,
    pub result: GatewayTransactionResult,
    pub state: PaymentState,
}

/// Asynchronous payment notification posted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<Value>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub status_code: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub payment_type: Option<String>,
}

impl GatewayNotification {
    pub fn financial_status(&self) -> FinancialStatus {
        FinancialStatus::from_gateway_code(&self.transaction_status)
    }
}

/// Update propagated back to the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_id: String,
    pub financial_status: FinancialStatus,
    pub note: String,
}

impl StatusUpdate {
    pub fn from_notification(notification: &GatewayNotification) -> Self {
        let financial_status = notification.financial_status();
        let code = notification.transaction_status.trim();
        let mut note = match financial_status {
            FinancialStatus::Paid => format!("Payment successful ({})", code),
            FinancialStatus::Pending => format!("Awaiting payment ({})", code),
            FinancialStatus::Voided => format!("Payment failed ({})", code),
        };
        if let Some(payment_type) = notification.payment_type.as_deref() {
            note.push_str(&format!(" via {}", payment_type));
        }
        if let Some(fraud) = notification.fraud_status.as_deref() {
            note.push_str(&format!(", fraud status: {}", fraud));
        }

        Self {
            order_id: notification.order_id.clone(),
            financial_status,
            note,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Descriptive fields never reject a notification: scalars become strings,
/// anything else is dropped.
fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}
