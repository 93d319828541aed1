//! redb-backed replica storage
//!
//! The browser-tab analog of persistent key-value storage: an active slot
//! per scope plus a bounded most-recent-first archive. Every committed
//! write publishes a [`StoreEvent`] tagged with the writing tab, which is
//! what cross-tab sync listens to.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ClientResult;

/// Active replica slot: key = scope, value = JSON [`StoredReplica`]
const ACTIVE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("active_order");

/// Archived orders: key = scope, value = JSON Vec<Order>, most recent first
const ARCHIVE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("order_archive");

/// Active order plus the timestamp it was written at; the timestamp
/// drives staleness checks on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReplica {
    pub order: Order,
    pub origin_ts: i64,
}

/// Storage-mutation notification: which scope changed and which tab
/// wrote it. Listeners ignore events carrying their own tab id.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub scope: String,
    pub origin: Uuid,
}

/// Shared replica store. One instance per storage scope owner; browser
/// tabs of the same profile share one store handle.
pub struct ReplicaStore {
    db: Database,
    events: broadcast::Sender<StoreEvent>,
}

impl ReplicaStore {
    /// Open or create the backing database.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Arc<Self>> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// In-memory backend, used by tests.
    pub fn open_in_memory() -> ClientResult<Arc<Self>> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> ClientResult<Arc<Self>> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACTIVE_TABLE)?;
            let _ = write_txn.open_table(ARCHIVE_TABLE)?;
        }
        write_txn.commit()?;

        let (events, _) = broadcast::channel(64);
        Ok(Arc::new(Self { db, events }))
    }

    /// Subscribe to storage-mutation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, scope: &str, origin: Uuid) {
        let _ = self.events.send(StoreEvent {
            scope: scope.to_string(),
            origin,
        });
    }

    // ========== Active slot ==========

    pub fn load_active(&self, scope: &str) -> ClientResult<Option<StoredReplica>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVE_TABLE)?;
        match table.get(scope)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_active(
        &self,
        scope: &str,
        replica: &StoredReplica,
        origin: Uuid,
    ) -> ClientResult<()> {
        let value = serde_json::to_vec(replica)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIVE_TABLE)?;
            table.insert(scope, value.as_slice())?;
        }
        write_txn.commit()?;
        self.notify(scope, origin);
        Ok(())
    }

    pub fn clear_active(&self, scope: &str, origin: Uuid) -> ClientResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIVE_TABLE)?;
            table.remove(scope)?;
        }
        write_txn.commit()?;
        self.notify(scope, origin);
        Ok(())
    }

    // ========== Archive ==========

    /// Prepend `order` to the scope's archive, keeping at most
    /// `capacity` entries (most recent first).
    pub fn archive(
        &self,
        scope: &str,
        order: &Order,
        capacity: usize,
        origin: Uuid,
    ) -> ClientResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ARCHIVE_TABLE)?;
            let mut archived: Vec<Order> = match table.get(scope)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Vec::new(),
            };
            archived.insert(0, order.clone());
            archived.truncate(capacity);
            let value = serde_json::to_vec(&archived)?;
            table.insert(scope, value.as_slice())?;
        }
        write_txn.commit()?;
        self.notify(scope, origin);
        Ok(())
    }

    pub fn archived(&self, scope: &str) -> ClientResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ARCHIVE_TABLE)?;
        match table.get(scope)? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{
        DeliveryAddress, DeliveryTiming, PaymentInfo, PaymentMethod, Stage, StatusEntry,
    };
    use shared::util::now_millis;

    pub(crate) fn sample_order(id: i64) -> Order {
        let now = now_millis();
        Order {
            id,
            user_id: None,
            items: vec![],
            subtotal: 0.0,
            discount: None,
            total: 0.0,
            address: DeliveryAddress {
                name: "Ada".into(),
                phone: "555-0100".into(),
                email: None,
                street: "1 Loop Rd".into(),
                city: "Springfield".into(),
                postal_code: "12345".into(),
            },
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                paid: false,
            },
            timing: DeliveryTiming::Asap,
            instructions: None,
            current_stage: Stage::Placed,
            status: Stage::Placed.label().into(),
            status_history: vec![StatusEntry::new(Stage::Placed, now)],
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_slot_round_trips() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let tab = Uuid::new_v4();

        assert!(store.load_active("s1").unwrap().is_none());

        let replica = StoredReplica {
            order: sample_order(1),
            origin_ts: now_millis(),
        };
        store.put_active("s1", &replica, tab).unwrap();
        let loaded = store.load_active("s1").unwrap().unwrap();
        assert_eq!(loaded.order.id, 1);

        store.clear_active("s1", tab).unwrap();
        assert!(store.load_active("s1").unwrap().is_none());
    }

    #[test]
    fn writes_notify_with_origin_tab() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let mut events = store.subscribe();
        let tab = Uuid::new_v4();

        let replica = StoredReplica {
            order: sample_order(2),
            origin_ts: now_millis(),
        };
        store.put_active("s1", &replica, tab).unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.scope, "s1");
        assert_eq!(event.origin, tab);
    }

    #[test]
    fn archive_is_bounded_most_recent_first() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let tab = Uuid::new_v4();

        for id in 1..=5 {
            store.archive("s1", &sample_order(id), 3, tab).unwrap();
        }

        let archived = store.archived("s1").unwrap();
        let ids: Vec<i64> = archived.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }
}
