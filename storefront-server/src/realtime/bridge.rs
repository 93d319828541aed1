//! Inter-process event bridge
//!
//! The broker's sole external-write surface. The order-mutation layer runs
//! in a short-lived request context with no access to the broker's
//! in-memory registry, so it asks the broker process to broadcast on its
//! behalf: a narrow HTTP endpoint gated by a shared secret delivered
//! out-of-band. Every other mutation path into the registry is rejected.
//!
//! Bridge calls are strictly best-effort: the order mutation has already
//! durably committed by the time the bridge is invoked, so a failed call
//! is a dropped notification, never a rollback.

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::broker::Broker;
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// Header carrying the shared bridge secret.
pub const BRIDGE_SECRET_HEADER: &str = "x-bridge-secret";

/// Broadcast request accepted by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct BrokerStats {
    pub connections: usize,
}

/// Bridge routes: the broadcast surface and the introspection endpoint.
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/bridge/broadcast", post(broadcast))
        .route("/realtime/stats", get(stats))
}

/// `POST /bridge/broadcast` — secret-gated fan-out on the caller's behalf.
///
/// The response never echoes the secret.
async fn broadcast(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<BroadcastRequest>,
) -> AppResult<Json<BroadcastResult>> {
    let presented = headers
        .get(BRIDGE_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || presented != state.config.bridge_secret {
        return Err(AppError::Unauthorized);
    }

    if req.event.trim().is_empty() {
        return Err(AppError::validation("event name must not be empty"));
    }

    let delivered = state
        .broker
        .broadcast(&req.event, req.payload, req.room.as_deref())
        .await;
    Ok(Json(BroadcastResult { delivered }))
}

/// `GET /realtime/stats` — live connection count, operational visibility
/// only.
async fn stats(State(state): State<ServerState>) -> Json<BrokerStats> {
    Json(BrokerStats {
        connections: state.broker.registry().connection_count(),
    })
}

// ========== Publishers ==========

/// How the mutation layer hands lifecycle events to the broker.
///
/// Implementations must not block the caller on broker availability;
/// failures are logged and dropped.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &str, payload: serde_json::Value, room: Option<&str>);
}

/// HTTP client for the bridge endpoint. `publish` spawns the request and
/// returns immediately; a failure is a dropped notification.
pub struct BridgeClient {
    http: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl BridgeClient {
    pub fn new(base_url: &str, secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            endpoint: format!("{}/bridge/broadcast", base_url.trim_end_matches('/')),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for BridgeClient {
    async fn publish(&self, event: &str, payload: serde_json::Value, room: Option<&str>) {
        let req = BroadcastRequest {
            event: event.to_string(),
            payload,
            room: room.map(str::to_string),
        };
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let secret = self.secret.clone();

        tokio::spawn(async move {
            let result = http
                .post(&endpoint)
                .header(BRIDGE_SECRET_HEADER, &secret)
                .json(&req)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!(event = %req.event, status = %resp.status(), "Bridge rejected broadcast");
                }
                Err(e) => {
                    tracing::warn!(event = %req.event, error = %e, "Bridge unreachable, broadcast dropped");
                }
            }
        });
    }
}

/// In-process publisher for deployments (and tests) where the broker
/// lives in the same process as the caller.
pub struct DirectPublisher {
    broker: Arc<Broker>,
}

impl DirectPublisher {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl EventPublisher for DirectPublisher {
    async fn publish(&self, event: &str, payload: serde_json::Value, room: Option<&str>) {
        self.broker.broadcast(event, payload, room).await;
    }
}

/// Publisher that records instead of delivering. Used by tests asserting
/// on the event stream without a live broker.
pub struct RecordingPublisher {
    events: std::sync::Mutex<Vec<BroadcastRequest>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<BroadcastRequest> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &str, payload: serde_json::Value, room: Option<&str>) {
        self.events.lock().unwrap().push(BroadcastRequest {
            event: event.to_string(),
            payload,
            room: room.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn direct_publisher_delivers_to_room_members() {
        use crate::realtime::transport::memory_pair;
        use std::time::Duration;

        let broker = Arc::new(Broker::new());
        let (transport, mut peer) = memory_pair();
        broker.attach(transport);
        peer.join("order-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let publisher = DirectPublisher::new(Arc::clone(&broker));
        publisher
            .publish("order:created", serde_json::json!({"id": 1}), Some("order-1"))
            .await;

        let frame = peer.recv_timeout(Duration::from_millis(200)).await.unwrap();
        assert_eq!(frame.decode_event().unwrap().event, "order:created");
    }
}
