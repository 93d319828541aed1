//! Order API handlers

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Deserialize;

use crate::auth::OptionalUser;
use crate::core::ServerState;
use crate::db::repository::order as order_repo;
use crate::orders::service::{CreateOrderRequest, FeedbackRequest, OrderService, StageUpdateRequest};
use crate::utils::{AppError, AppResult};
use shared::order::Order;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders", post(create).get(list))
        .route("/api/orders/{id}", get(get_by_id))
        .route("/api/orders/{id}/stage", patch(update_stage))
        .route("/api/orders/{id}/feedback", post(feedback))
}

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    50
}

/// Create an order from checkout
async fn create(
    State(state): State<ServerState>,
    OptionalUser(user): OptionalUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<Order>> {
    let order = state.orders.create_order(payload, user).await?;
    Ok(Json(order))
}

/// List orders (staff poll fallback, paginated)
async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = order_repo::find_all(&state.pool, query.limit, query.offset).await?;
    Ok(Json(orders))
}

/// Get order by id
async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    let order = order_repo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    Ok(Json(order))
}

/// Move an order to a target stage, or cancel it
async fn update_stage(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<StageUpdateRequest>,
) -> AppResult<Json<Order>> {
    let target = OrderService::resolve_target(&payload)?;
    let order = state.orders.update_stage(id, target).await?;
    Ok(Json(order))
}

/// Submit one-time feedback for a delivered order
async fn feedback(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<FeedbackRequest>,
) -> AppResult<Json<Order>> {
    let order = state.orders.submit_feedback(id, payload).await?;
    Ok(Json(order))
}
