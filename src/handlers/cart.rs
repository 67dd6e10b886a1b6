use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    UserQuery,
};
use crate::{
    entities::CartItemModel,
    errors::ApiError,
    services::cart::{AddCartItem, CartView},
    ApiResponse, AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(add_to_cart))
        .route("/user/{user_id}", get(get_cart).delete(clear_cart))
        .route(
            "/items/{cart_item_id}",
            put(update_cart_item).delete(remove_cart_item),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub user_id: i32,
    /// 0 removes the line
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCleared {
    pub removed_items: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/user/{user_id}",
    summary = "Get cart",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cart lines and subtotal", body = ApiResponse<CartView>),
    ),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .list_cart(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(cart)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    summary = "Add to cart",
    description = "Prices the line from the variant and merges it with an identical line",
    request_body = AddCartItem,
    responses(
        (status = 201, description = "Cart line saved", body = ApiResponse<CartItemModel>),
        (status = 400, description = "Invalid item", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<AddCartItem>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let line = state
        .services
        .cart
        .add_item(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(ApiResponse::success(line)))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{cart_item_id}",
    summary = "Update cart quantity",
    params(("cart_item_id" = i32, Path, description = "Cart item ID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated line, or null when removed", body = ApiResponse<Option<CartItemModel>>),
        (status = 403, description = "Line belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(cart_item_id): Path<i32>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let line = state
        .services
        .cart
        .update_quantity(cart_item_id, payload.user_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(line)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{cart_item_id}",
    summary = "Remove cart line",
    params(
        ("cart_item_id" = i32, Path, description = "Cart item ID"),
        UserQuery,
    ),
    responses(
        (status = 204, description = "Line removed"),
        (status = 403, description = "Line belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(cart_item_id): Path<i32>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(cart_item_id, query.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/user/{user_id}",
    summary = "Clear cart",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<CartCleared>),
    ),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let removed_items = state
        .services
        .cart
        .clear_cart(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(CartCleared {
        removed_items,
    })))
}
