use crate::errors::ServiceError;
use crate::models::{FinancialStatus, PlatformOrderId};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Note attribute carrying the relayed payment status.
pub const PAYMENT_STATUS_ATTRIBUTE: &str = "payment_status";

/// Write-back surface of the commerce platform.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Sets the order note (and payment status attribute, when given).
    /// Sending the same update twice leaves the order in the same state.
    async fn update_order(
        &self,
        order_id: &PlatformOrderId,
        update: &OrderUpdate,
    ) -> Result<(), ServiceError>;

    /// Fetches the raw order object.
    async fn get_order(&self, order_id: &PlatformOrderId) -> Result<Value, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub note: String,
    pub financial_status: Option<FinancialStatus>,
}

impl OrderUpdate {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            financial_status: None,
        }
    }

    pub fn with_status(note: impl Into<String>, status: FinancialStatus) -> Self {
        Self {
            note: note.into(),
            financial_status: Some(status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Store admin base, e.g. `https://shop.myshopify.com`
    pub base_url: String,
    pub access_token: String,
    pub api_version: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ShopifyClient {
    client: reqwest::Client,
    config: ShopifyConfig,
}

impl ShopifyClient {
    pub fn new(config: ShopifyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("payment-bridge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.config.access_token) {
            Ok(value) => {
                headers.insert("X-Shopify-Access-Token", value);
            }
            Err(err) => {
                warn!("Invalid Shopify access token header value: {}", err);
            }
        }
        headers
    }
}

#[async_trait]
impl CommercePlatform for ShopifyClient {
    async fn update_order(
        &self,
        order_id: &PlatformOrderId,
        update: &OrderUpdate,
    ) -> Result<(), ServiceError> {
        let payload = OrderUpdateEnvelope {
            order: OrderUpdatePayload {
                id: order_id.as_str(),
                note: &update.note,
                note_attributes: update.financial_status.map(|status| {
                    vec![NoteAttribute {
                        name: PAYMENT_STATUS_ATTRIBUTE.to_string(),
                        value: status.as_str().to_string(),
                    }]
                }),
            },
        };

        let url = self.endpoint(&format!("orders/{}.json", order_id));
        let response = self
            .client
            .put(url)
            .headers(self.auth_headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                ServiceError::RelayError(format!("Shopify order update failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::RelayError(format!(
                "Shopify order update failed ({}): {}",
                status, body_text
            )));
        }

        debug!(order_id = %order_id, "Shopify order updated");
        Ok(())
    }

    async fn get_order(&self, order_id: &PlatformOrderId) -> Result<Value, ServiceError> {
        let url = self.endpoint(&format!("orders/{}.json", order_id));
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(|e| ServiceError::RelayError(format!("Shopify order fetch failed: {}", e)))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found in Shopify",
                order_id
            )));
        }

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::RelayError(format!(
                "Shopify order fetch failed ({}): {}",
                status, body_text
            )));
        }

        let body = response.json::<OrderEnvelope>().await.map_err(|e| {
            ServiceError::RelayError(format!("Failed to parse Shopify order response: {}", e))
        })?;

        Ok(body.order)
    }
}

#[derive(Debug, Serialize)]
struct OrderUpdateEnvelope<'a> {
    order: OrderUpdatePayload<'a>,
}

#[derive(Debug, Serialize)]
struct OrderUpdatePayload<'a> {
    id: &'a str,
    note: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_attributes: Option<Vec<NoteAttribute>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteAttribute {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: Value,
}
