//! Order read and update endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::OrderId;
use serde_json::Value;
use store::{Order, OrderPatch};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::{CurrentUser, json_body};
use crate::validation::validate_order_patch;
use crate::{AppState, Backend};

/// GET /api/profile/order/{order_id}: an order owned by the caller.
#[tracing::instrument(skip(state))]
pub async fn get<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id("order id", &order_id)?;
    let order = state.orders.get_order(user_id, order_id).await?;
    Ok(Json(order))
}

/// PATCH /api/profile/order/{order_id}: update status, payment, delivery
/// or comments.
#[tracing::instrument(skip(state, body))]
pub async fn update<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id("order id", &order_id)?;
    let body = json_body(body)?;
    let patch = OrderPatch::from_fields(validate_order_patch(&body)?)?;
    let order = state.orders.update_order(user_id, order_id, patch).await?;
    Ok(Json(order))
}
