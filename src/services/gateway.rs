use crate::errors::ServiceError;
use crate::metrics::GATEWAY_ERRORS;
use crate::models::{CanonicalOrder, GatewayTransactionResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, instrument};
use url::Url;

/// Creates hosted-payment transactions for canonical orders.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        order: &CanonicalOrder,
    ) -> Result<GatewayTransactionResult, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SnapGatewayConfig {
    pub base_url: String,
    pub server_key: String,
    /// Where the hosted page sends the buyer once done
    pub finish_url: Option<String>,
    pub timeout: Duration,
}

/// Client for the Snap hosted-payment API.
#[derive(Clone)]
pub struct SnapGateway {
    client: reqwest::Client,
    config: SnapGatewayConfig,
}

impl SnapGateway {
    pub fn new(config: SnapGatewayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("payment-bridge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/transactions", self.config.base_url.trim_end_matches('/'))
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let credentials = STANDARD.encode(format!("{}:", self.config.server_key));
        match HeaderValue::from_str(&format!("Basic {}", credentials)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(err) => {
                error!("Invalid gateway authorization header value: {}", err);
            }
        }
        headers
    }

    fn build_request(&self, order: &CanonicalOrder) -> SnapTransactionRequest {
        let item_details: Vec<SnapItem> = order
            .line_items
            .iter()
            .map(|item| SnapItem {
                id: item.id.clone(),
                price: item.unit_price,
                quantity: item.quantity,
                name: item.name.clone(),
                category: item.category.clone(),
                url: item.url.clone(),
            })
            .collect();

        SnapTransactionRequest {
            transaction_details: TransactionDetails {
                order_id: order.id.clone(),
                gross_amount: order.gross_amount,
            },
            item_details: (!item_details.is_empty()).then_some(item_details),
            customer_details: CustomerDetails {
                first_name: order.customer.first_name.clone(),
                email: order.customer.email.clone(),
                phone: order.customer.phone.clone(),
            },
            credit_card: CreditCard { secure: true },
            callbacks: self
                .config
                .finish_url
                .as_ref()
                .map(|finish| Callbacks {
                    finish: finish.clone(),
                }),
        }
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    #[instrument(skip(self, order), fields(order_id = %order.id, gross_amount = order.gross_amount))]
    async fn create_transaction(
        &self,
        order: &CanonicalOrder,
    ) -> Result<GatewayTransactionResult, ServiceError> {
        let payload = self.build_request(order);

        let response = self
            .client
            .post(self.endpoint())
            .headers(self.auth_headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                GATEWAY_ERRORS.inc();
                error!(error = %e, "Payment gateway unreachable");
                ServiceError::gateway(502, format!("Payment gateway request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            GATEWAY_ERRORS.inc();
            let body_text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<Value>(&body_text)
                .unwrap_or_else(|_| Value::String(body_text));
            error!(status = status.as_u16(), body = %body, "Payment gateway rejected transaction");
            return Err(ServiceError::gateway(status.as_u16(), body));
        }

        let body = response.json::<SnapTransactionResponse>().await.map_err(|e| {
            GATEWAY_ERRORS.inc();
            ServiceError::gateway(
                status.as_u16(),
                format!("Failed to parse gateway response: {}", e),
            )
        })?;

        let redirect_url = match body.redirect_url.as_deref() {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                ServiceError::gateway(
                    status.as_u16(),
                    format!("Gateway returned invalid redirect_url {:?}: {}", raw, e),
                )
            })?),
            None => None,
        };

        info!(has_redirect = redirect_url.is_some(), "Gateway transaction created");

        Ok(GatewayTransactionResult {
            redirect_url,
            token: body.token,
            raw_status: status.to_string(),
        })
    }
}

// Snap wire types

#[derive(Debug, Serialize)]
struct SnapTransactionRequest {
    transaction_details: TransactionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_details: Option<Vec<SnapItem>>,
    customer_details: CustomerDetails,
    credit_card: CreditCard,
    #[serde(skip_serializing_if = "Option::is_none")]
    callbacks: Option<Callbacks>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails {
    order_id: String,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapItem {
    id: String,
    price: i64,
    quantity: u32,
    name: String,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CustomerDetails {
    first_name: String,
    email: String,
    phone: String,
}

#[derive(Debug, Serialize)]
struct CreditCard {
    secure: bool,
}

#[derive(Debug, Serialize)]
struct Callbacks {
    finish: String,
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: Option<String>,
    redirect_url: Option<String>,
}
