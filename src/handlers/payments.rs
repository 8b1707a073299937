use crate::{
    errors::ServiceError,
    models::{PaymentRecord, PaymentState, PlatformOrderId},
    services::{Pipeline, PipelineOutcome},
    AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Success body of the transaction-creating routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
    pub order_id: String,
    pub redirect_url: Option<String>,
    pub token: Option<String>,
}

impl From<PipelineOutcome> for TransactionResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        Self {
            success: true,
            message: "Payment transaction created".to_string(),
            redirect_url: outcome.redirect_url().map(|url| url.to_string()),
            token: outcome.token().map(str::to_string),
            order_id: outcome.order_id,
        }
    }
}

fn parse_payload(body: &Bytes) -> Result<Value, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid JSON body: {}", e)))
}

// POST /webhook
pub async fn order_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let payload = parse_payload(&body)?;
    let outcome = Pipeline::PLATFORM_ORDER
        .run(&state.bridge, &state.normalizer, &payload)
        .await?;
    Ok(Json(outcome.into()))
}

// POST /create-payment
pub async fn create_payment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let payload = parse_payload(&body)?;
    let outcome = Pipeline::CART
        .run(&state.bridge, &state.normalizer, &payload)
        .await?;
    Ok(Json(outcome.into()))
}

// GET /pay/:order_id
pub async fn pay_redirect(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, ServiceError> {
    let platform_id = PlatformOrderId::parse(&order_id);
    let key = platform_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| order_id.clone());

    if let Some(record) = state.bridge.lookup(&key).await {
        return redirect_for(record);
    }

    let (Some(platform_id), Some(platform)) = (platform_id, state.bridge.platform()) else {
        return Err(ServiceError::NotFound(format!(
            "no payment link for order {}",
            order_id
        )));
    };

    info!(order_id = %platform_id, "Payment link not cached; rebuilding from platform order");
    let order = platform.get_order(&platform_id).await?;
    match order.get("financial_status").and_then(Value::as_str) {
        Some("paid" | "partially_refunded" | "refunded") => {
            return Err(ServiceError::Conflict(format!(
                "order {} already paid",
                platform_id
            )));
        }
        Some("voided") => {
            return Err(ServiceError::Gone(format!(
                "payment voided for order {}",
                platform_id
            )));
        }
        _ => {}
    }

    let outcome = Pipeline::PLATFORM_ORDER
        .without_relay()
        .run(&state.bridge, &state.normalizer, &order)
        .await?;

    redirect_for(outcome.record)
}

fn redirect_for(record: PaymentRecord) -> Result<Response, ServiceError> {
    match record.state {
        PaymentState::Paid => Err(ServiceError::Conflict(format!(
            "order {} already paid",
            record.order_id
        ))),
        PaymentState::Voided => Err(ServiceError::Gone(format!(
            "payment voided for order {}",
            record.order_id
        ))),
        PaymentState::Created | PaymentState::AwaitingPayment => {
            let url = record.result.redirect_url.ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "gateway issued no redirect URL for order {}",
                    record.order_id
                ))
            })?;
            Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
        }
    }
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(order_webhook))
        .route("/create-payment", post(create_payment))
        .route("/pay/:order_id", get(pay_redirect))
}
