//! Order lifecycle state machine
//!
//! Owns transition legality as pure functions over [`Stage`]. The rules:
//! - customer flow advances strictly `Placed -> Preparing -> Baking ->
//!   Out for Delivery -> Delivered`;
//! - cancellation is legal only while still at `Placed`;
//! - staff overrides may jump forward past intermediate stages, but
//!   `Delivered` can only follow `Out for Delivery`;
//! - repeating the current stage is an idempotent no-op.
//!
//! An illegal request is rejected without touching state; the caller gets
//! a typed error to surface.

use shared::order::{Order, Stage, StatusEntry};

/// Planned outcome of a legal transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the new stage, appending one history entry.
    Apply(Stage),
    /// Target equals the current stage; nothing to do.
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Order is already terminal ({0})")]
    Terminal(Stage),

    #[error("Cancellation is only permitted while the order is still Placed")]
    CancelRefused,

    #[error("Stage cannot move backwards (from {from} to {to})")]
    Backwards { from: Stage, to: Stage },

    #[error("Delivered can only follow Out for Delivery")]
    PrematureDelivery,
}

/// Decide whether `current -> target` is legal.
pub fn plan_transition(current: Stage, target: Stage) -> Result<Transition, TransitionError> {
    if target == current {
        return Ok(Transition::Noop);
    }

    if target == Stage::Cancelled {
        return if current == Stage::Placed {
            Ok(Transition::Apply(Stage::Cancelled))
        } else {
            Err(TransitionError::CancelRefused)
        };
    }

    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }

    if target.code() < current.code() {
        return Err(TransitionError::Backwards {
            from: current,
            to: target,
        });
    }

    if target == Stage::Delivered && current != Stage::OutForDelivery {
        return Err(TransitionError::PrematureDelivery);
    }

    Ok(Transition::Apply(target))
}

/// Strict single-step advance, as driven by the kitchen flow and the
/// client replica's timer.
pub fn plan_advance(current: Stage) -> Result<Stage, TransitionError> {
    current.next().ok_or(TransitionError::Terminal(current))
}

/// History for `order` with one entry appended for `to`.
///
/// The history is copied, never mutated in place; the caller persists it
/// behind a compare-and-set so a rejected write discards the copy.
pub fn appended_history(order: &Order, to: Stage, timestamp: i64) -> Vec<StatusEntry> {
    let mut history = order.status_history.clone();
    history.push(StatusEntry::new(to, timestamp));
    history
}
