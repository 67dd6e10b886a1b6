use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

use super::{
    common::{created_response, map_service_error, validate_input},
    orders::{place_order, OrderPlacedResponse},
};
use crate::{
    errors::{ApiError, ServiceError},
    services::{
        orders::{NewOrder, NewOrderItem},
        payments::verify_razorpay_signature,
    },
    AppState,
};

pub fn payments_routes() -> Router<AppState> {
    Router::new().route("/verify", post(verify_payment))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "razorpay_order_id is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "razorpay_payment_id is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "razorpay_signature is required"))]
    pub razorpay_signature: String,
    pub order: NewOrder,
    pub order_items: Vec<NewOrderItem>,
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    summary = "Verify Razorpay payment",
    description = "Checks the checkout signature, then creates the order as paid",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 201, description = "Payment verified and order created", body = OrderPlacedResponse),
        (status = 400, description = "Signature mismatch or invalid order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Coupon exhausted or order number collision", body = crate::errors::ErrorResponse),
        (status = 503, description = "Payment verification not configured", body = crate::errors::ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let secret = state
        .config
        .razorpay_key_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::ServiceUnavailable("Payment verification is not configured".to_string())
        })?;

    if !verify_razorpay_signature(
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
        secret,
    ) {
        warn!(
            razorpay_order_id = %payload.razorpay_order_id,
            "payment signature mismatch"
        );
        return Err(ApiError::BadRequest {
            message: "Payment verification failed".to_string(),
        });
    }

    let mut order = payload.order;
    order.payment_status = "paid".to_string();
    order.payment_reference = Some(payload.razorpay_payment_id);
    validate_input(&order)?;
    for item in &payload.order_items {
        validate_input(item)?;
    }

    let placed = place_order(&state, order, payload.order_items)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(placed))
}
