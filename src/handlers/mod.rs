pub mod gateway_webhooks;
pub mod health;
pub mod payments;

use crate::AppState;
use axum::Router;

/// All public routes, without state or middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::health_routes())
        .merge(payments::payment_routes())
        .merge(gateway_webhooks::gateway_webhook_routes())
}
