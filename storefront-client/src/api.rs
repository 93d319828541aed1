//! HTTP client for the storefront API
//!
//! Used at checkout and by the replica's mirror writes. Mirror failures
//! are the caller's to drop; nothing here retries.

use serde::Serialize;
use shared::order::{
    CartItemInput, DeliveryAddress, DeliveryTiming, Order, PaymentInfo, Stage,
};
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Checkout payload, mirroring the server's create-order request shape.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDraft {
    pub items: Vec<CartItemInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub address: DeliveryAddress,
    pub payment: PaymentInfo,
    pub timing: DeliveryTiming,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach a session token; subsequent requests carry it as Bearer.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// `POST /api/orders`
    pub async fn create_order(&self, draft: &OrderDraft) -> ClientResult<Order> {
        let url = format!("{}/api/orders", self.base_url);
        let response = self.request(self.client.post(&url)).json(draft).send().await?;
        Self::parse(response).await
    }

    /// `GET /api/orders/{id}`
    pub async fn get_order(&self, order_id: i64) -> ClientResult<Order> {
        let url = format!("{}/api/orders/{order_id}", self.base_url);
        let response = self.request(self.client.get(&url)).send().await?;
        Self::parse(response).await
    }

    /// `PATCH /api/orders/{id}/stage` — mirror a locally simulated
    /// advance into the canonical store. Same-stage writes are no-ops
    /// server-side, so mirroring is idempotent.
    pub async fn update_stage(&self, order_id: i64, stage: Stage) -> ClientResult<Order> {
        let url = format!("{}/api/orders/{order_id}/stage", self.base_url);
        let body = serde_json::json!({ "stage": stage.code() });
        let response = self.request(self.client.patch(&url)).json(&body).send().await?;
        Self::parse(response).await
    }
}
