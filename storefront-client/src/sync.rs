//! Cross-tab convergence
//!
//! Listens for storage-mutation notifications scoped to the active
//! replica key. Sibling-originated changes trigger a wholesale reload;
//! a tab's own writes are suppressed by the origin tag, which is the
//! re-entrancy guard preventing write/notify feedback loops.

use std::sync::Weak;
use tokio::sync::broadcast;

use crate::replica::{ReplicaInner, handle_sibling_change};
use crate::store::StoreEvent;

/// Spawn the sync listener for one tab. The task ends when the replica
/// handle drops or the store closes.
pub(crate) fn spawn(weak: Weak<ReplicaInner>, mut events: broadcast::Receiver<StoreEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    if event.scope != inner.config.scope || event.origin == inner.tab_id {
                        continue;
                    }
                    handle_sibling_change(&inner);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Reloads are wholesale, so missed intermediate
                    // notifications collapse into the next one.
                    tracing::debug!(skipped, "Sync listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
