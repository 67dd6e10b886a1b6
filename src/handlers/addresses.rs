use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    UserQuery,
};
use crate::{
    entities::AddressModel, errors::ApiError, services::addresses::AddressInput, ApiResponse,
    AppState,
};

pub fn addresses_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_address))
        .route("/user/{user_id}", get(list_addresses))
        .route("/{address_id}", put(update_address).delete(delete_address))
        .route("/{address_id}/default", put(set_default_address))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetDefaultRequest {
    pub user_id: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/addresses/user/{user_id}",
    summary = "List addresses",
    description = "Active addresses for a user, default first",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Addresses", body = ApiResponse<Vec<AddressModel>>),
    ),
    tag = "addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state
        .services
        .addresses
        .list_addresses(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(addresses)))
}

#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    summary = "Create address",
    description = "The first address a user saves becomes the default",
    request_body = AddressInput,
    responses(
        (status = 201, description = "Address created", body = ApiResponse<AddressModel>),
        (status = 400, description = "Invalid address", body = crate::errors::ErrorResponse),
    ),
    tag = "addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .create_address(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(ApiResponse::success(address)))
}

#[utoipa::path(
    put,
    path = "/api/v1/addresses/{address_id}",
    summary = "Update address",
    params(("address_id" = i32, Path, description = "Address ID")),
    request_body = AddressInput,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<AddressModel>),
        (status = 400, description = "Invalid address", body = crate::errors::ErrorResponse),
        (status = 403, description = "Address belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
    ),
    tag = "addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    Path(address_id): Path<i32>,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .update_address(address_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(address)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{address_id}",
    summary = "Delete address",
    description = "Soft delete. Orders keep referencing the row.",
    params(
        ("address_id" = i32, Path, description = "Address ID"),
        UserQuery,
    ),
    responses(
        (status = 204, description = "Address deactivated"),
        (status = 403, description = "Address belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
    ),
    tag = "addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    Path(address_id): Path<i32>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .addresses
        .delete_address(address_id, query.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

#[utoipa::path(
    put,
    path = "/api/v1/addresses/{address_id}/default",
    summary = "Set default address",
    params(("address_id" = i32, Path, description = "Address ID")),
    request_body = SetDefaultRequest,
    responses(
        (status = 200, description = "Default address changed", body = ApiResponse<AddressModel>),
        (status = 403, description = "Address belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
    ),
    tag = "addresses"
)]
pub async fn set_default_address(
    State(state): State<AppState>,
    Path(address_id): Path<i32>,
    Json(payload): Json<SetDefaultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .set_default_address(address_id, payload.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(address)))
}
