use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    entities::OrderModel,
    errors::{ApiError, ServiceError},
    services::{
        fulfillment::FulfillmentReport,
        orders::{NewOrder, NewOrderItem, OrderDetails},
    },
    ApiResponse, AppState,
};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_order))
        .route("/{order_id}", get(get_order))
        .route("/user/{user_id}", get(list_user_orders))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub order: NewOrder,
    pub order_items: Vec<NewOrderItem>,
}

/// Committed order plus what happened to shipping and email. Returned
/// unwrapped, as `{order, order_items, fulfillment}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPlacedResponse {
    #[serde(flatten)]
    pub details: OrderDetails,
    pub fulfillment: FulfillmentReport,
}

/// Creates the order, then runs the best-effort side effects. Only the
/// order transaction decides the outcome.
pub(crate) async fn place_order(
    state: &AppState,
    order: NewOrder,
    items: Vec<NewOrderItem>,
) -> Result<OrderPlacedResponse, ServiceError> {
    let details = state
        .services
        .orders
        .create_order_with_items(order, items)
        .await?;

    let fulfillment = state.services.fulfillment.run(&details).await;
    info!(
        order_number = %details.order.order.order_number,
        shipping = ?fulfillment.shipping,
        email = ?fulfillment.email,
        "order placed"
    );

    Ok(OrderPlacedResponse {
        details,
        fulfillment,
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/create",
    summary = "Create order",
    description = "Creates the order and its items in one transaction, clears the cart for cart checkouts, then registers the shipment and sends the receipt",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderPlacedResponse),
        (status = 400, description = "Invalid order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Coupon exhausted or order number collision", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload.order)?;
    for item in &payload.order_items {
        validate_input(item)?;
    }

    let placed = place_order(&state, payload.order, payload.order_items)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(placed))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    summary = "Get order",
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with address, customer and items", body = ApiResponse<OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .services
        .orders
        .get_order_details(order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(details)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/user/{user_id}",
    summary = "List a user's orders",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<OrderModel>>),
    ),
    tag = "orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders_for_user(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(orders)))
}
