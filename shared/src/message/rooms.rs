//! Room naming
//!
//! Rooms are named subscription topics. These helpers are the single
//! source of the naming convention so server and client never drift.

/// Staff dashboard: receives order creations.
pub const ADMIN_DASHBOARD: &str = "admin-dashboard";

/// Staff order board: receives every stage change.
pub const ADMIN_ORDERS: &str = "admin-orders";

/// All connected customer browsers.
pub const CUSTOMERS: &str = "customers";

/// Catalog change notifications.
pub const MENU_UPDATES: &str = "menu-updates";

/// Per-order room, joined by the tabs tracking that order.
pub fn order_room(order_id: i64) -> String {
    format!("order-{order_id}")
}

/// Per-user room for account-scoped pushes.
pub fn user_room(user_id: &str) -> String {
    format!("user-{user_id}")
}
