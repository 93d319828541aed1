//! Real-time fan-out
//!
//! ```text
//! mutation layer ──HTTP + secret──► bridge ──► Broker ──► rooms
//!                                              │
//!                                    ConnectionRegistry
//!                                              │
//!                              TcpTransport / MemoryTransport
//! ```

pub mod bridge;
pub mod broker;
pub mod registry;
pub mod transport;

pub use bridge::{BridgeClient, DirectPublisher, EventPublisher};
pub use broker::Broker;
pub use registry::ConnectionRegistry;
pub use transport::{MemoryPeer, TcpTransport, Transport, memory_pair};
