//! Broker wire protocol
//!
//! Shared between the fan-out broker and its subscribers. Frames travel as
//! `[1-byte kind][4-byte LE payload length][JSON payload]`; the async
//! framing itself lives in the server's transport layer.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod rooms;

/// Broadcast event names pushed through the broker.
pub mod events {
    /// New order created at checkout.
    pub const ORDER_CREATED: &str = "order:created";
    /// Stage transition (including cancellation).
    pub const ORDER_STATUS: &str = "order:status";
    /// Post-delivery feedback captured.
    pub const ORDER_FEEDBACK: &str = "order:feedback";
    /// Menu content changed; customers should refresh their catalog.
    pub const MENU_UPDATED: &str = "menu:updated";
}

/// Frame kind discriminant, first byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// Subscriber asks to join a room.
    Join = 0,
    /// Broker delivers a broadcast event.
    Event = 1,
}

impl TryFrom<u8> for FrameKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Join),
            1 => Ok(FrameKind::Event),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Join => write!(f, "join"),
            FrameKind::Event => write!(f, "event"),
        }
    }
}

/// Subscriber -> broker: join a named room.
///
/// Membership is connection-scoped and ephemeral; a reconnecting client
/// re-issues its joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub room: String,
}

/// Broker -> subscriber: one broadcast delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: String,
    pub payload: serde_json::Value,
    /// Room the broadcast was scoped to; None for fleet-wide delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// A decoded wire frame: kind plus raw JSON payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    pub fn join(room: &str) -> Self {
        let payload = serde_json::to_vec(&JoinPayload {
            room: room.to_string(),
        })
        .expect("join payload serializes");
        Self::new(FrameKind::Join, payload)
    }

    pub fn event(event: &EventPayload) -> Self {
        let payload = serde_json::to_vec(event).expect("event payload serializes");
        Self::new(FrameKind::Event, payload)
    }

    pub fn decode_join(&self) -> Result<JoinPayload, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    pub fn decode_event(&self) -> Result<EventPayload, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_kind_round_trips() {
        assert_eq!(FrameKind::try_from(0u8), Ok(FrameKind::Join));
        assert_eq!(FrameKind::try_from(1u8), Ok(FrameKind::Event));
        assert!(FrameKind::try_from(9u8).is_err());
    }

    #[test]
    fn join_frame_decodes() {
        let frame = Frame::join("order-42");
        assert_eq!(frame.kind, FrameKind::Join);
        assert_eq!(frame.decode_join().unwrap().room, "order-42");
    }
}
