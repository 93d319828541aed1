//! Real-time fan-out broker
//!
//! Long-lived process component holding subscriber connections grouped
//! into rooms. Delivery is best-effort, at-most-once per connection per
//! broadcast: a write failure drops the connection and the subscriber is
//! expected to reconnect, re-join its rooms and re-fetch durable state.

use shared::message::{EventPayload, Frame, FrameKind};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::registry::ConnectionRegistry;
use super::transport::{TcpTransport, Transport};
use crate::utils::AppError;

pub struct Broker {
    registry: Arc<ConnectionRegistry>,
    shutdown_token: CancellationToken,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Gracefully stop the accept loop and all connection readers.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down broker");
        self.shutdown_token.cancel();
    }

    /// Fan an event out to a room's members, or to every connection when
    /// no room is given. Returns the number of successful deliveries.
    pub async fn broadcast(
        &self,
        event: &str,
        payload: serde_json::Value,
        room: Option<&str>,
    ) -> usize {
        let envelope = EventPayload {
            event: event.to_string(),
            payload,
            room: room.map(str::to_string),
        };
        let frame = Frame::event(&envelope);

        let targets = match room {
            Some(room) => self.registry.members(room),
            None => self.registry.all(),
        };

        let mut delivered = 0;
        for (id, transport) in targets {
            match transport.write_frame(&frame).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // No queueing, no redelivery: the connection is gone.
                    tracing::info!(connection_id = %id, error = %e, "Dropping dead subscriber");
                    self.registry.remove(id);
                }
            }
        }

        tracing::debug!(event, room = room.unwrap_or("<all>"), delivered, "Broadcast complete");
        delivered
    }

    /// Attach an already-built transport (in-process subscribers, tests)
    /// and spawn its read loop.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Uuid {
        let id = self.registry.register(transport.clone());
        let registry = Arc::clone(&self.registry);
        let shutdown = self.shutdown_token.clone();
        tokio::spawn(async move {
            Self::read_loop(registry, shutdown, id, transport).await;
        });
        id
    }

    /// Accept subscriber connections until shutdown.
    pub async fn serve_tcp(&self, listen_addr: &str) -> Result<(), AppError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind broker port: {e}")))?;

        tracing::info!("Broker listening on {listen_addr}");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Broker accept loop stopping");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::info!("Subscriber connected: {addr}");
                            let transport: Arc<dyn Transport> =
                                Arc::new(TcpTransport::from_stream(stream));
                            self.attach(transport);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {e}");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Per-connection read loop: handles join requests until the peer
    /// drops or the broker shuts down, then removes the connection
    /// (implicitly leaving every room).
    async fn read_loop(
        registry: Arc<ConnectionRegistry>,
        shutdown: CancellationToken,
        id: Uuid,
        transport: Arc<dyn Transport>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = transport.read_frame() => {
                    match result {
                        Ok(frame) if frame.kind == FrameKind::Join => {
                            match frame.decode_join() {
                                Ok(join) => registry.join(id, &join.room),
                                Err(e) => {
                                    tracing::warn!(connection_id = %id, error = %e, "Malformed join frame");
                                }
                            }
                        }
                        Ok(frame) => {
                            tracing::warn!(connection_id = %id, kind = %frame.kind, "Unexpected frame from subscriber");
                        }
                        Err(_) => break,
                    }
                }
            }
        }
        registry.remove(id);
        tracing::debug!(connection_id = %id, "Subscriber disconnected");
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
