//! Order mutation layer
//!
//! One logical operation per external request, no shared in-process
//! mutable state between requests; durability lives in the store. Every
//! mutation publishes its lifecycle event through the bridge after the
//! commit — the publish is best-effort and never blocks or rolls back the
//! mutation.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

use shared::message::{events, rooms};
use shared::offer::DiscountOutcome;
use shared::order::{
    AppliedDiscount, CartItemInput, DeliveryAddress, DeliveryTiming, Order, PaymentInfo, Stage,
    StatusEntry,
};
use shared::util::{now_millis, round_money, snowflake_id};

use crate::db::repository::{RepoError, offer as offer_repo, order as order_repo};
use crate::orders::lifecycle::{self, Transition};
use crate::pricing;
use crate::realtime::EventPublisher;
use crate::services::EmailService;
use crate::utils::{AppError, AppResult};

/// Checkout request as accepted by `POST /api/orders`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<CartItemInput>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub address: DeliveryAddress,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub timing: DeliveryTiming,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Stage update request: an explicit target stage, or the cancel sentinel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageUpdateRequest {
    #[serde(default)]
    pub stage: Option<i8>,
    #[serde(default)]
    pub cancel: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Stage-change payload broadcast to the order's room and the staff board.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusEventPayload {
    pub order_id: i64,
    pub stage: Stage,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    publisher: Arc<dyn EventPublisher>,
    mailer: EmailService,
}

impl OrderService {
    pub fn new(pool: SqlitePool, publisher: Arc<dyn EventPublisher>, mailer: EmailService) -> Self {
        Self {
            pool,
            publisher,
            mailer,
        }
    }

    // ========== Creation ==========

    /// Create an order from a checkout request.
    ///
    /// Validates, prices the cart server-side, redeems the coupon
    /// transactionally, persists, then notifies: broker event to the
    /// order room and the admin dashboard, confirmation email
    /// fire-and-forget.
    pub async fn create_order(
        &self,
        req: CreateOrderRequest,
        user_id: Option<String>,
    ) -> AppResult<Order> {
        req.validate()?;
        validate_items(&req.items)?;

        let now = now_millis();
        let items: Vec<_> = req.items.iter().map(pricing::price_item).collect();
        let subtotal = pricing::subtotal(&items);

        // Guests are keyed by phone so per-user coupon caps still hold.
        let user_key = user_id
            .clone()
            .unwrap_or_else(|| format!("guest:{}", req.address.phone));

        let discount = match normalized_code(req.coupon_code.as_deref()) {
            None => None,
            Some(code) => Some(
                self.redeem_coupon(
                    &code,
                    subtotal,
                    &user_key,
                    user_id.as_deref(),
                    &req.address.phone,
                    now,
                )
                .await?,
            ),
        };

        let total = round_money(subtotal - discount.as_ref().map(|d| d.amount).unwrap_or(0.0));

        let order = Order {
            id: snowflake_id(),
            user_id,
            items,
            subtotal,
            discount,
            total,
            address: req.address,
            payment: req.payment,
            timing: req.timing,
            instructions: req.instructions,
            current_stage: Stage::Placed,
            status: Stage::Placed.label().to_string(),
            status_history: vec![StatusEntry::new(Stage::Placed, now)],
            feedback: None,
            created_at: now,
            updated_at: now,
        };

        order_repo::create(&self.pool, &order).await?;
        tracing::info!(order_id = order.id, total = order.total, "Order created");

        let payload = serde_json::to_value(&order).unwrap_or_default();
        self.publisher
            .publish(events::ORDER_CREATED, payload.clone(), Some(&rooms::order_room(order.id)))
            .await;
        self.publisher
            .publish(events::ORDER_CREATED, payload, Some(rooms::ADMIN_DASHBOARD))
            .await;

        self.mailer.send_order_confirmation(&order);

        Ok(order)
    }

    /// Evaluate and consume one redemption slot for `code`.
    ///
    /// Eligibility is checked against a snapshot first (typed rejection
    /// reasons), but the caps are enforced again inside the store
    /// transaction — the snapshot check alone can lose a race for the
    /// last slot, in which case the redemption itself rejects.
    async fn redeem_coupon(
        &self,
        code: &str,
        subtotal: f64,
        user_key: &str,
        user_id: Option<&str>,
        phone: &str,
        now: i64,
    ) -> AppResult<AppliedDiscount> {
        let offer = offer_repo::find_by_code(&self.pool, code)
            .await?
            .ok_or_else(|| AppError::validation(format!("Unknown coupon code: {code}")))?;

        let user_usage = offer_repo::user_usage(&self.pool, code, user_key).await?;
        let has_prior = order_repo::has_prior_orders(&self.pool, user_id, phone).await?;

        let amount = match pricing::apply_discount(subtotal, &offer, user_usage, has_prior, now) {
            DiscountOutcome::Applied { amount } => amount,
            DiscountOutcome::Rejected { reason } => {
                return Err(AppError::business_rule(format!(
                    "Coupon {} not applicable: {reason:?}",
                    offer.code
                )));
            }
        };

        match offer_repo::redeem(&self.pool, code, user_key, offer.per_user_limit).await {
            Ok(()) => Ok(AppliedDiscount {
                code: offer.code,
                amount,
            }),
            Err(RepoError::Conflict(msg)) => Err(AppError::business_rule(msg)),
            Err(e) => Err(e.into()),
        }
    }

    // ========== Stage transitions ==========

    /// Move an order to `target` (staff override or customer-visible
    /// advance). Repeating the current stage is a no-op returning the
    /// unchanged order, which makes retried requests harmless.
    pub async fn update_stage(&self, order_id: i64, target: Stage) -> AppResult<Order> {
        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        let to = match lifecycle::plan_transition(order.current_stage, target) {
            Ok(Transition::Noop) => return Ok(order),
            Ok(Transition::Apply(to)) => to,
            Err(e) => return Err(AppError::business_rule(e.to_string())),
        };

        let now = now_millis();
        let history = lifecycle::appended_history(&order, to, now);
        let updated =
            match order_repo::update_stage(&self.pool, order_id, order.current_stage, to, &history, now)
                .await
            {
                Ok(updated) => updated,
                Err(RepoError::Conflict(msg)) => return Err(AppError::business_rule(msg)),
                Err(e) => return Err(e.into()),
            };

        tracing::info!(order_id, from = %order.current_stage, to = %to, "Order stage updated");

        let payload = serde_json::to_value(StatusEventPayload {
            order_id,
            stage: to,
            status: to.label().to_string(),
            timestamp: now,
        })
        .unwrap_or_default();
        self.publisher
            .publish(events::ORDER_STATUS, payload.clone(), Some(&rooms::order_room(order_id)))
            .await;
        self.publisher
            .publish(events::ORDER_STATUS, payload, Some(rooms::ADMIN_ORDERS))
            .await;

        Ok(updated)
    }

    /// Cancel an order; legal only while still Placed.
    pub async fn cancel(&self, order_id: i64) -> AppResult<Order> {
        self.update_stage(order_id, Stage::Cancelled).await
    }

    /// Resolve a stage-update request body into a target stage.
    pub fn resolve_target(req: &StageUpdateRequest) -> AppResult<Stage> {
        if req.cancel {
            return Ok(Stage::Cancelled);
        }
        let code = req
            .stage
            .ok_or_else(|| AppError::validation("either stage or cancel is required"))?;
        Stage::from_code(code)
            .ok_or_else(|| AppError::validation(format!("invalid stage code {code}")))
    }

    // ========== Feedback ==========

    /// Capture one-time feedback for a delivered order.
    pub async fn submit_feedback(&self, order_id: i64, req: FeedbackRequest) -> AppResult<Order> {
        req.validate()?;

        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        if order.current_stage != Stage::Delivered {
            return Err(AppError::business_rule(
                "Feedback is only accepted once the order is delivered",
            ));
        }
        if order.feedback.is_some() {
            return Err(AppError::conflict("Feedback has already been submitted"));
        }

        let now = now_millis();
        let updated = match order_repo::set_feedback(
            &self.pool,
            order_id,
            req.rating,
            req.comment.as_deref(),
            now,
        )
        .await
        {
            Ok(updated) => updated,
            // Lost a race with another submission; first one stands.
            Err(RepoError::Conflict(msg)) => return Err(AppError::conflict(msg)),
            Err(e) => return Err(e.into()),
        };

        self.publisher
            .publish(
                events::ORDER_FEEDBACK,
                serde_json::json!({ "order_id": order_id, "rating": req.rating }),
                Some(rooms::ADMIN_DASHBOARD),
            )
            .await;

        Ok(updated)
    }
}

fn normalized_code(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
}

fn validate_items(items: &[CartItemInput]) -> AppResult<()> {
    for (index, item) in items.iter().enumerate() {
        if !item.base_price.is_finite() || item.base_price < 0.0 {
            return Err(AppError::validation(format!(
                "items[{index}].base_price must be a non-negative number"
            )));
        }
        if !item.crust.surcharge.is_finite() || item.crust.surcharge < 0.0 {
            return Err(AppError::validation(format!(
                "items[{index}].crust.surcharge must be a non-negative number"
            )));
        }
        if item.quantity < 1 || item.quantity > 99 {
            return Err(AppError::validation(format!(
                "items[{index}].quantity must be between 1 and 99"
            )));
        }
        for (j, add_on) in item.add_ons.iter().enumerate() {
            if let Some(price) = add_on.price
                && (!price.is_finite() || price < 0.0)
            {
                return Err(AppError::validation(format!(
                    "items[{index}].add_ons[{j}].price must be a non-negative number"
                )));
            }
        }
    }
    Ok(())
}
