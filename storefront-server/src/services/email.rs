//! Outbound email collaborator
//!
//! Order confirmations go out through an external mail API, invoked
//! fire-and-forget after the order has durably committed. A send failure
//! is logged and dropped; it never rolls back or delays the order.

use shared::order::Order;
use std::time::Duration;

#[derive(Clone)]
pub struct EmailService {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl EmailService {
    /// `endpoint` is the mail API URL; None disables sending entirely.
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self { http, endpoint }
    }

    /// Queue an order confirmation. Returns immediately.
    pub fn send_order_confirmation(&self, order: &Order) {
        let Some(endpoint) = self.endpoint.clone() else {
            tracing::debug!(order_id = order.id, "Email disabled, skipping confirmation");
            return;
        };
        let Some(to) = order.address.email.clone() else {
            tracing::debug!(order_id = order.id, "No contact email on order, skipping confirmation");
            return;
        };

        let body = serde_json::json!({
            "to": to,
            "subject": format!("Order #{} confirmed", order.id),
            "order_id": order.id,
            "total": order.total,
            "status": order.status,
        });

        let http = self.http.clone();
        let order_id = order.id;
        tokio::spawn(async move {
            match http.post(&endpoint).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(order_id, "Confirmation email queued");
                }
                Ok(resp) => {
                    tracing::warn!(order_id, status = %resp.status(), "Mail API rejected confirmation");
                }
                Err(e) => {
                    tracing::warn!(order_id, error = %e, "Mail API unreachable, confirmation dropped");
                }
            }
        });
    }
}
