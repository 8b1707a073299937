use crate::{models::GatewayNotification, AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use serde_json::json;
use tracing::{info, warn};

// POST /midtrans-webhook, POST /gateway-webhook
//
// The gateway retries anything that is not a 200, so every delivery is
// acknowledged, including ones that cannot be parsed.
pub async fn gateway_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    match serde_json::from_slice::<GatewayNotification>(&body) {
        Ok(notification) => {
            info!(
                order_id = %notification.order_id,
                transaction_status = %notification.transaction_status,
                "Gateway notification received"
            );
            state.bridge.apply_notification(&notification).await;
        }
        Err(err) => {
            warn!(
                error = %err,
                body = %String::from_utf8_lossy(&body),
                "Ignoring malformed gateway notification"
            );
        }
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}

pub fn gateway_webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/midtrans-webhook", post(gateway_notification))
        .route("/gateway-webhook", post(gateway_notification))
}
