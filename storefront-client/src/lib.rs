//! Storefront client library
//!
//! The per-tab side of the storefront: a persisted local replica of one
//! in-flight order, a cancellable timer animating its progress, cross-tab
//! convergence over storage notifications, and the HTTP client used for
//! checkout and stage mirroring.

pub mod api;
pub mod config;
pub mod error;
pub mod replica;
pub mod scheduler;
pub mod store;
mod sync;

pub use api::{ApiClient, OrderDraft};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use replica::OrderReplica;
pub use scheduler::AdvanceScheduler;
pub use store::{ReplicaStore, StoreEvent, StoredReplica};
