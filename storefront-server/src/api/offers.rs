//! Offer API handlers

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::auth::OptionalUser;
use crate::core::ServerState;
use crate::db::repository::{offer as offer_repo, order as order_repo};
use crate::pricing;
use crate::utils::{AppError, AppResult};
use shared::offer::DiscountOutcome;
use shared::util::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/offers/preview", post(preview))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub code: String,
    pub subtotal: f64,
}

/// Read-only eligibility preview for checkout; mutates no counters. The
/// authoritative check happens again at order creation.
async fn preview(
    State(state): State<ServerState>,
    OptionalUser(user): OptionalUser,
    Json(payload): Json<PreviewRequest>,
) -> AppResult<Json<DiscountOutcome>> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(AppError::validation("code must not be empty"));
    }

    let offer = offer_repo::find_by_code(&state.pool, code)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Offer {code} not found")))?;

    let user_key = user.clone().unwrap_or_else(|| "guest".to_string());
    let user_usage = offer_repo::user_usage(&state.pool, code, &user_key).await?;
    let has_prior = order_repo::has_prior_orders(&state.pool, user.as_deref(), "").await?;

    let outcome = pricing::apply_discount(payload.subtotal, &offer, user_usage, has_prior, now_millis());
    Ok(Json(outcome))
}
