//! Cart and checkout endpoints for the current user.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{PopulatedCart, ServiceError};
use common::{Money, ProductId};
use serde::Serialize;
use serde_json::Value;
use store::{CartItem, Order};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, json_body};
use crate::validation::{validate_add_item, validate_checkout, validate_set_count};
use crate::{AppState, Backend};

#[derive(Serialize)]
pub struct CartResponse {
    pub cart: PopulatedCart,
    pub total: Money,
}

/// GET /api/profile/cart: the user's OPEN cart with current prices.
#[tracing::instrument(skip(state))]
pub async fn get<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(user_id).await?;
    let total = cart.total().map_err(ServiceError::from)?;
    Ok(Json(CartResponse { cart, total }))
}

/// DELETE /api/profile/cart: discard the OPEN cart.
#[tracing::instrument(skip(state))]
pub async fn clear<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/profile/cart/items: add units of a product.
#[tracing::instrument(skip(state, body))]
pub async fn add_item<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CartItem>, ApiError> {
    let req = validate_add_item(&json_body(body)?)?;
    let item = state
        .carts
        .add_item(user_id, req.product_id, req.count)
        .await?;
    Ok(Json(item))
}

/// PUT /api/profile/cart/items/{product_id}: set the absolute count.
///
/// Responds `204` when a zero count removed the item.
#[tracing::instrument(skip(state, body))]
pub async fn set_item_count<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let product_id: ProductId = parse_id("product id", &product_id)?;
    let count = validate_set_count(&json_body(body)?)?;

    match state
        .carts
        .set_item_count(user_id, product_id, count)
        .await?
    {
        Some(item) => Ok(Json(item).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// DELETE /api/profile/cart/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id("product id", &product_id)?;
    state.carts.remove_item(user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/profile/cart/checkout: turn the OPEN cart into an order.
#[tracing::instrument(skip(state, body))]
pub async fn checkout<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let request = validate_checkout(&json_body(body)?)?;
    let order = state.checkout.checkout(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
