//! Client configuration

use std::time::Duration;

/// Tunables for the local replica.
///
/// Defaults match the storefront UI: a 15s simulated advance, a one-hour
/// staleness threshold, a short grace delay before a delivered order is
/// archived, and a bounded archive.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Storage scope; one active replica may exist per scope.
    pub scope: String,
    /// Interval between simulated stage advances.
    pub advance_interval: Duration,
    /// Replicas older than this are discarded on load.
    pub staleness_threshold: Duration,
    /// Delay between reaching Delivered and archiving the replica.
    pub delivered_grace: Duration,
    /// Most-recent-first archive size bound.
    pub archive_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scope: "default".to_string(),
            advance_interval: Duration::from_secs(15),
            staleness_threshold: Duration::from_secs(60 * 60),
            delivered_grace: Duration::from_secs(30),
            archive_capacity: 10,
        }
    }
}

impl ClientConfig {
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Default::default()
        }
    }
}
