use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    entities::CouponModel,
    errors::{ApiError, ServiceError},
    services::{
        coupon_rules::CartLine,
        coupons::{CouponApplication, CouponDetails, CouponInput},
    },
    ApiResponse, AppState,
};

pub fn coupons_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons))
        .route("/validate", post(validate_coupon))
        .route("/available", post(available_coupons))
        .route("/create", post(create_coupon))
        .route(
            "/{coupon_id}",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "coupon_code is required"))]
    pub coupon_code: String,
    #[serde(default)]
    pub cart_items: Vec<CartLine>,
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
}

/// Flat body kept compatible with the storefront checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateCouponResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)]
    pub final_total: Option<Decimal>,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AvailableCouponsRequest {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    summary = "Validate coupon",
    description = "Runs the eligibility checks for a coupon against a cart and returns the discount",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon applies", body = ValidateCouponResponse),
        (status = 400, description = "Coupon does not apply or request invalid", body = ValidateCouponResponse),
        (status = 404, description = "Unknown coupon code", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let application = state
        .services
        .coupons
        .apply_coupon(
            &payload.coupon_code,
            &payload.cart_items,
            payload.subtotal,
            payload.user_id,
            payload.source_collection_id,
        )
        .await
        .map_err(map_service_error)?;

    Ok(match application {
        CouponApplication::Applied { coupon, breakdown } => (
            StatusCode::OK,
            Json(ValidateCouponResponse {
                success: true,
                coupon: Some(coupon),
                discount: Some(breakdown.discount_amount),
                final_total: Some(breakdown.final_total),
                message: breakdown.message,
            }),
        ),
        CouponApplication::Rejected { message } => (
            StatusCode::BAD_REQUEST,
            Json(ValidateCouponResponse {
                success: false,
                coupon: None,
                discount: None,
                final_total: None,
                message,
            }),
        ),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/coupons/available",
    summary = "Available coupons",
    description = "Active sales coupons, plus user coupons when a user is given and collection coupons mapped to the source collection",
    request_body = AvailableCouponsRequest,
    responses(
        (status = 200, description = "Coupons the shopper can use", body = ApiResponse<Vec<CouponModel>>),
    ),
    tag = "coupons"
)]
pub async fn available_coupons(
    State(state): State<AppState>,
    payload: Option<Json<AvailableCouponsRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let coupons = state
        .services
        .coupons
        .available_coupons(request.user_id, request.source_collection_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(coupons)))
}

#[utoipa::path(
    post,
    path = "/api/v1/coupons/create",
    summary = "Create coupon",
    request_body = CouponInput,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<CouponDetails>),
        (status = 400, description = "Invalid coupon definition", body = crate::errors::ErrorResponse),
        (status = 409, description = "Coupon code already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state
        .services
        .coupons
        .create_coupon(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(ApiResponse::success(coupon)))
}

#[utoipa::path(
    get,
    path = "/api/v1/coupons",
    summary = "List coupons",
    responses(
        (status = 200, description = "All coupons", body = ApiResponse<Vec<CouponModel>>),
    ),
    tag = "coupons"
)]
pub async fn list_coupons(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let coupons = state
        .services
        .coupons
        .list_coupons()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(coupons)))
}

#[utoipa::path(
    get,
    path = "/api/v1/coupons/{coupon_id}",
    summary = "Get coupon",
    params(("coupon_id" = i32, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon with its collections", body = ApiResponse<CouponDetails>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .services
        .coupons
        .get_coupon(coupon_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(coupon)))
}

#[utoipa::path(
    put,
    path = "/api/v1/coupons/{coupon_id}",
    summary = "Update coupon",
    params(("coupon_id" = i32, Path, description = "Coupon ID")),
    request_body = CouponInput,
    responses(
        (status = 200, description = "Coupon updated", body = ApiResponse<CouponDetails>),
        (status = 400, description = "Invalid coupon definition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Coupon code already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<i32>,
    Json(payload): Json<CouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state
        .services
        .coupons
        .update_coupon(coupon_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(coupon)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/coupons/{coupon_id}",
    summary = "Delete coupon",
    params(("coupon_id" = i32, Path, description = "Coupon ID")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    tag = "coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.coupons.delete_coupon(coupon_id).await?;
    Ok(no_content_response())
}
