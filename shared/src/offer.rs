//! Offer (coupon) model
//!
//! Codes are stored uppercase and matched case-insensitively. Usage
//! counters are only mutated transactionally at order-creation time; the
//! eligibility check itself is a pure function in the pricing engine.

use serde::{Deserialize, Serialize};

/// Discount shape of an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// Percent of subtotal, optionally capped. `max_discount: None` means
    /// uncapped.
    Percent { value: f64, max_discount: Option<f64> },
    /// Flat amount off the subtotal.
    Fixed { value: f64 },
}

/// Coupon definition with validity window and usage caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub code: String,
    #[serde(flatten)]
    pub kind: DiscountKind,
    pub valid_from: i64,
    pub valid_to: i64,
    pub min_order_amount: f64,
    /// Global usage cap; None = unlimited.
    pub usage_limit: Option<i64>,
    pub per_user_limit: i64,
    /// Running global counter; never exceeds `usage_limit`.
    pub used_count: i64,
    pub first_order_only: bool,
}

/// Why an offer did not apply. Returned as data, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferRejection {
    NotYetActive,
    Expired,
    BelowMinimum,
    GloballyExhausted,
    UserLimitReached,
    FirstOrderOnly,
}

/// Outcome of evaluating an offer against a subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountOutcome {
    Applied { amount: f64 },
    Rejected { reason: OfferRejection },
}

impl DiscountOutcome {
    /// Discount amount, zero when rejected.
    pub fn amount(&self) -> f64 {
        match self {
            DiscountOutcome::Applied { amount } => *amount,
            DiscountOutcome::Rejected { .. } => 0.0,
        }
    }
}
