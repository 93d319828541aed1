//! Local order replica
//!
//! Mirrors one in-flight order per storage scope. The replica animates
//! progress with a cancellable timer when no live push is configured,
//! writes every change through to storage, mirrors simulated advances to
//! the canonical store, and converges with sibling tabs through storage
//! notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use shared::order::{Order, Stage, StatusEntry};
use shared::util::now_millis;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::scheduler::AdvanceScheduler;
use crate::store::{ReplicaStore, StoredReplica};
use crate::sync;

pub(crate) struct ReplicaInner {
    pub(crate) tab_id: Uuid,
    pub(crate) config: ClientConfig,
    pub(crate) store: Arc<ReplicaStore>,
    api: Option<ApiClient>,
    pub(crate) current: Mutex<Option<Order>>,
    pub(crate) scheduler: AdvanceScheduler,
    /// Counts sibling-originated reloads; own echoes never bump it.
    pub(crate) sync_generation: AtomicU64,
}

/// A per-tab handle on the active order.
///
/// At most one active replica exists per storage scope; all handles over
/// the same scope converge on the same order.
pub struct OrderReplica {
    inner: Arc<ReplicaInner>,
}

impl OrderReplica {
    /// Create the replica on checkout success: persist the order with an
    /// origin timestamp, start the advance timer and cross-tab sync.
    pub fn activate(
        store: Arc<ReplicaStore>,
        api: Option<ApiClient>,
        config: ClientConfig,
        order: Order,
    ) -> ClientResult<Self> {
        let inner = ReplicaInner::new(store, api, config);
        inner.write_through(&order)?;
        *inner.current.lock().unwrap() = Some(order);
        start_tasks(&inner);
        Ok(Self { inner })
    }

    /// Resume from storage on tab load. A record past the staleness
    /// threshold is discarded silently, as if no active order existed.
    pub fn load(
        store: Arc<ReplicaStore>,
        api: Option<ApiClient>,
        config: ClientConfig,
    ) -> ClientResult<Option<Self>> {
        let inner = ReplicaInner::new(store, api, config);

        let Some(stored) = inner.store.load_active(&inner.config.scope)? else {
            return Ok(None);
        };

        let age_ms = now_millis() - stored.origin_ts;
        if age_ms > inner.config.staleness_threshold.as_millis() as i64 {
            tracing::debug!(
                scope = %inner.config.scope,
                age_ms,
                "Discarding stale replica"
            );
            inner.store.clear_active(&inner.config.scope, inner.tab_id)?;
            return Ok(None);
        }

        *inner.current.lock().unwrap() = Some(stored.order);
        start_tasks(&inner);
        Ok(Some(Self { inner }))
    }

    /// In-memory copy of the active order.
    pub fn current(&self) -> Option<Order> {
        self.inner.current.lock().unwrap().clone()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.inner
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|o| o.current_stage)
    }

    pub fn tab_id(&self) -> Uuid {
        self.inner.tab_id
    }

    /// Archived (delivered) orders for this scope, most recent first.
    pub fn archived(&self) -> ClientResult<Vec<Order>> {
        self.inner.store.archived(&self.inner.config.scope)
    }

    /// Stop the timer; sync and archive tasks end once the handle drops.
    pub fn shutdown(&self) {
        self.inner.scheduler.cancel();
    }
}

impl ReplicaInner {
    fn new(store: Arc<ReplicaStore>, api: Option<ApiClient>, config: ClientConfig) -> Arc<Self> {
        let scheduler = AdvanceScheduler::new(config.advance_interval);
        Arc::new(Self {
            tab_id: Uuid::new_v4(),
            config,
            store,
            api,
            current: Mutex::new(None),
            scheduler,
            sync_generation: AtomicU64::new(0),
        })
    }

    fn write_through(&self, order: &Order) -> ClientResult<()> {
        self.store.put_active(
            &self.config.scope,
            &StoredReplica {
                order: order.clone(),
                origin_ts: order.created_at,
            },
            self.tab_id,
        )
    }

    /// Mirror a simulated advance into the canonical store, best-effort.
    fn mirror_stage(&self, order_id: i64, stage: Stage) {
        let Some(api) = self.api.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = api.update_stage(order_id, stage).await {
                tracing::debug!(order_id, error = %e, "Stage mirror dropped");
            }
        });
    }
}

/// Start the advance timer (when the order is still in flight) and the
/// cross-tab sync listener.
fn start_tasks(inner: &Arc<ReplicaInner>) {
    let in_flight = inner
        .current
        .lock()
        .unwrap()
        .as_ref()
        .is_some_and(|o| !o.current_stage.is_terminal());
    if in_flight {
        start_timer(inner);
    }
    sync::spawn(Arc::downgrade(inner), inner.store.subscribe());
}

/// (Re)arm the advance timer. Always cancel-and-replace so state changes
/// never leave two timers in flight.
pub(crate) fn start_timer(inner: &Arc<ReplicaInner>) {
    let weak = Arc::downgrade(inner);
    inner.scheduler.schedule(move || {
        let weak = weak.clone();
        async move {
            match weak.upgrade() {
                Some(inner) => advance_once(&inner),
                None => false,
            }
        }
    });
}

/// One timer tick: advance the local stage, append history, write
/// through, mirror, and archive on delivery. Returns false when the
/// timer should stop.
fn advance_once(inner: &Arc<ReplicaInner>) -> bool {
    let updated = {
        let mut guard = inner.current.lock().unwrap();
        let Some(order) = guard.as_mut() else {
            return false;
        };
        let Some(next) = order.current_stage.next() else {
            return false;
        };

        let now = now_millis();
        order.current_stage = next;
        order.status = next.label().to_string();
        order.status_history.push(StatusEntry::new(next, now));
        order.updated_at = now;
        order.clone()
    };

    if let Err(e) = inner.write_through(&updated) {
        tracing::warn!(order_id = updated.id, error = %e, "Replica write-through failed");
    }
    inner.mirror_stage(updated.id, updated.current_stage);

    if updated.current_stage == Stage::Delivered {
        schedule_archive(inner, updated);
        return false;
    }
    true
}

/// After the grace delay, move the delivered order into the bounded
/// archive and clear the active slot.
fn schedule_archive(inner: &Arc<ReplicaInner>, order: Order) {
    let weak = Arc::downgrade(inner);
    let grace = inner.config.delivered_grace;
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if let Err(e) = inner.store.archive(
            &inner.config.scope,
            &order,
            inner.config.archive_capacity,
            inner.tab_id,
        ) {
            tracing::warn!(order_id = order.id, error = %e, "Archive write failed");
        }
        if let Err(e) = inner.store.clear_active(&inner.config.scope, inner.tab_id) {
            tracing::warn!(order_id = order.id, error = %e, "Active slot clear failed");
        }
        *inner.current.lock().unwrap() = None;
        inner.scheduler.cancel();
    });
}

/// A sibling tab changed our scope's active slot: replace the in-memory
/// copy wholesale (no field-level merge) and reschedule the timer.
pub(crate) fn handle_sibling_change(inner: &Arc<ReplicaInner>) {
    match inner.store.load_active(&inner.config.scope) {
        Ok(Some(stored)) => {
            let terminal = stored.order.current_stage.is_terminal();
            *inner.current.lock().unwrap() = Some(stored.order);
            inner.sync_generation.fetch_add(1, Ordering::SeqCst);
            if terminal {
                inner.scheduler.cancel();
            } else {
                start_timer(inner);
            }
        }
        Ok(None) => {
            *inner.current.lock().unwrap() = None;
            inner.sync_generation.fetch_add(1, Ordering::SeqCst);
            inner.scheduler.cancel();
        }
        Err(e) => {
            tracing::warn!(scope = %inner.config.scope, error = %e, "Sibling reload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{DeliveryAddress, DeliveryTiming, PaymentInfo, PaymentMethod};
    use std::time::Duration;

    fn fast_config(scope: &str) -> ClientConfig {
        ClientConfig {
            scope: scope.into(),
            advance_interval: Duration::from_millis(20),
            staleness_threshold: Duration::from_secs(3600),
            delivered_grace: Duration::from_millis(40),
            archive_capacity: 5,
        }
    }

    fn idle_config(scope: &str) -> ClientConfig {
        ClientConfig {
            advance_interval: Duration::from_secs(600),
            ..fast_config(scope)
        }
    }

    fn placed_order(id: i64) -> Order {
        let now = now_millis();
        Order {
            id,
            user_id: None,
            items: vec![],
            subtotal: 1790.0,
            discount: None,
            total: 1790.0,
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

    #[tokio::test]
    async fn timer_walks_to_delivered_then_archives() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let replica =
            OrderReplica::activate(store.clone(), None, fast_config("s1"), placed_order(1))
                .unwrap();

        // 4 advances at 20ms + 40ms grace
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(replica.current().is_none());
        assert!(store.load_active("s1").unwrap().is_none());

        let archived = replica.archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].current_stage, Stage::Delivered);
        // History grew one entry per simulated advance
        assert_eq!(archived[0].status_history.len(), 5);
    }

    #[tokio::test]
    async fn each_advance_writes_through_to_storage() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let replica =
            OrderReplica::activate(store.clone(), None, fast_config("s2"), placed_order(2))
                .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stored = store.load_active("s2").unwrap().unwrap();
        assert!(stored.order.current_stage.code() >= Stage::Preparing.code());
        assert_eq!(
            stored.order.current_stage,
            replica.stage().unwrap_or(stored.order.current_stage)
        );
        replica.shutdown();
    }

    #[tokio::test]
    async fn stale_record_is_discarded_on_load() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let mut order = placed_order(3);
        order.created_at -= 2 * 3600 * 1000;
        store
            .put_active(
                "s3",
                &StoredReplica {
                    order: order.clone(),
                    origin_ts: order.created_at,
                },
                Uuid::new_v4(),
            )
            .unwrap();

        let loaded = OrderReplica::load(store.clone(), None, idle_config("s3")).unwrap();
        assert!(loaded.is_none());
        // Discarded as if no active order exists
        assert!(store.load_active("s3").unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_record_resumes_on_load() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let mut order = placed_order(4);
        order.current_stage = Stage::Baking;
        order.status = Stage::Baking.label().into();
        store
            .put_active(
                "s4",
                &StoredReplica {
                    order: order.clone(),
                    origin_ts: order.created_at,
                },
                Uuid::new_v4(),
            )
            .unwrap();

        let replica = OrderReplica::load(store, None, idle_config("s4"))
            .unwrap()
            .expect("non-stale replica resumes");
        assert_eq!(replica.stage(), Some(Stage::Baking));
        replica.shutdown();
    }

    #[tokio::test]
    async fn sibling_change_replaces_wholesale_and_suppresses_own_echo() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let tab_a =
            OrderReplica::activate(store.clone(), None, idle_config("s5"), placed_order(5))
                .unwrap();
        let tab_b = OrderReplica::load(store.clone(), None, idle_config("s5"))
            .unwrap()
            .expect("tab B sees the active order");

        // Tab A simulates an advance written under its own tab id
        let mut advanced = tab_a.current().unwrap();
        advanced.current_stage = Stage::Baking;
        advanced.status = Stage::Baking.label().into();
        advanced
            .status_history
            .push(StatusEntry::new(Stage::Baking, now_millis()));
        store
            .put_active(
                "s5",
                &StoredReplica {
                    origin_ts: advanced.created_at,
                    order: advanced,
                },
                tab_a.tab_id(),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        // B replaced its copy wholesale; A ignored its own notification
        assert_eq!(tab_b.stage(), Some(Stage::Baking));
        assert_eq!(tab_b.current().unwrap().status_history.len(), 2);
        assert_eq!(tab_b.inner.sync_generation.load(Ordering::SeqCst), 1);
        assert_eq!(tab_a.inner.sync_generation.load(Ordering::SeqCst), 0);
        assert_eq!(tab_a.stage(), Some(Stage::Placed));
    }

    #[tokio::test]
    async fn sibling_clear_empties_the_replica() {
        let store = ReplicaStore::open_in_memory().unwrap();
        let tab_a =
            OrderReplica::activate(store.clone(), None, idle_config("s6"), placed_order(6))
                .unwrap();
        let tab_b = OrderReplica::load(store.clone(), None, idle_config("s6"))
            .unwrap()
            .expect("tab B sees the active order");

        store.clear_active("s6", tab_a.tab_id()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(tab_b.current().is_none());
        assert!(!tab_b.inner.scheduler.is_running());
    }
}
