//! Offer eligibility and discount computation
//!
//! Evaluation is a pure function over a snapshot of the offer; the
//! authoritative cap enforcement happens again at redemption time inside
//! the store transaction. An ineligible offer yields a typed rejection
//! reason, never an error.

use rust_decimal::prelude::*;
use shared::offer::{DiscountKind, DiscountOutcome, Offer, OfferRejection};

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Evaluate `offer` against `subtotal` at time `now`.
///
/// `user_usage` is the caller's redemption count for this code;
/// `has_prior_orders` feeds the first-order-only restriction.
pub fn apply_discount(
    subtotal: f64,
    offer: &Offer,
    user_usage: i64,
    has_prior_orders: bool,
    now: i64,
) -> DiscountOutcome {
    if now < offer.valid_from {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::NotYetActive,
        };
    }
    if now > offer.valid_to {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::Expired,
        };
    }
    if subtotal < offer.min_order_amount {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::BelowMinimum,
        };
    }
    if let Some(limit) = offer.usage_limit
        && offer.used_count >= limit
    {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::GloballyExhausted,
        };
    }
    if user_usage >= offer.per_user_limit {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::UserLimitReached,
        };
    }
    if offer.first_order_only && has_prior_orders {
        return DiscountOutcome::Rejected {
            reason: OfferRejection::FirstOrderOnly,
        };
    }

    let subtotal = dec(subtotal);
    let raw = match &offer.kind {
        DiscountKind::Fixed { value } => dec(*value),
        DiscountKind::Percent {
            value,
            max_discount,
        } => {
            let pct = subtotal * dec(*value) / Decimal::ONE_HUNDRED;
            match max_discount {
                Some(cap) => pct.min(dec(*cap)),
                None => pct,
            }
        }
    };

    // A discount never exceeds the subtotal it applies to.
    let amount = round2(raw.min(subtotal).max(Decimal::ZERO));
    DiscountOutcome::Applied {
        amount: amount.to_f64().unwrap_or(0.0),
    }
}
