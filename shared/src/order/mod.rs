//! Order domain model
//!
//! The canonical order record and its building blocks. Orders are created
//! once at checkout; items, subtotal and address are immutable afterwards.
//! Only stage transitions (and one-time feedback capture) mutate an order.

pub mod stage;
pub mod types;

pub use stage::Stage;
pub use types::*;

use serde::{Deserialize, Serialize};

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub stage: Stage,
    pub label: String,
    pub timestamp: i64,
}

impl StatusEntry {
    pub fn new(stage: Stage, timestamp: i64) -> Self {
        Self {
            stage,
            label: stage.label().to_string(),
            timestamp,
        }
    }
}

/// Discount applied to an order at creation time, by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: f64,
}

/// One-time feedback captured after delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub submitted_at: i64,
}

/// The canonical order record.
///
/// Invariants:
/// - `status_history` is non-empty and append-only; its last entry's stage
///   equals `current_stage`.
/// - `current_stage` only increases, except the single legal drop to
///   Cancelled from Placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Authenticated customer, if any; guest orders carry None.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<AppliedDiscount>,
    pub total: f64,
    pub address: DeliveryAddress,
    pub payment: PaymentInfo,
    pub timing: DeliveryTiming,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub current_stage: Stage,
    /// Denormalized label of `current_stage`, kept for display queries.
    pub status: String,
    pub status_history: Vec<StatusEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Last recorded history entry.
    ///
    /// The history is never empty for a persisted order; an empty history
    /// here means the record was constructed by hand.
    pub fn last_status(&self) -> Option<&StatusEntry> {
        self.status_history.last()
    }
}
