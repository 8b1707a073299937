use crate::errors::ServiceError;
use crate::models::{OrderSource, PaymentRecord, PaymentState};
use crate::services::bridge::GatewayBridge;
use crate::services::normalizer::OrderNormalizer;
use serde_json::Value;
use tracing::instrument;

/// One payment-creation flow: normalize, create the transaction, optionally
/// write the payment link back to the platform order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    pub source: OrderSource,
    pub relay_payment_link: bool,
}

impl Pipeline {
    /// Order-created webhooks from the platform.
    pub const PLATFORM_ORDER: Pipeline = Pipeline {
        source: OrderSource::PlatformOrder,
        relay_payment_link: true,
    };

    /// Carts posted straight from the storefront.
    pub const CART: Pipeline = Pipeline {
        source: OrderSource::Cart,
        relay_payment_link: false,
    };

    pub fn without_relay(self) -> Self {
        Self {
            relay_payment_link: false,
            ..self
        }
    }

    #[instrument(skip_all, fields(source = ?self.source))]
    pub async fn run(
        &self,
        bridge: &GatewayBridge,
        normalizer: &OrderNormalizer,
        payload: &Value,
    ) -> Result<PipelineOutcome, ServiceError> {
        let order = normalizer.normalize(payload, self.source)?;
        let record = bridge.create_transaction(&order).await?;

        // A replay after settlement or expiry must not overwrite the status note
        let payment_open = matches!(
            record.state,
            PaymentState::Created | PaymentState::AwaitingPayment
        );
        if self.relay_payment_link && payment_open && order.platform_id().is_some() {
            if let Some(url) = record.result.redirect_url.as_ref() {
                bridge.relay_payment_link(&order.id, url).await;
            }
        }

        Ok(PipelineOutcome {
            order_id: order.id,
            record,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub order_id: String,
    pub record: PaymentRecord,
}

impl PipelineOutcome {
    pub fn redirect_url(&self) -> Option<&url::Url> {
        self.record.result.redirect_url.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.record.result.token.as_deref()
    }
}
