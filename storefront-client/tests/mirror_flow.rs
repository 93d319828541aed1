//! Client <-> server round trip: checkout over HTTP, replica animation,
//! and mirroring of simulated advances into the canonical store.

use std::time::Duration;

use shared::order::{
    CartItemInput, Crust, DeliveryAddress, DeliveryTiming, PaymentInfo, PaymentMethod, Size, Stage,
};
use storefront_client::{ApiClient, ClientConfig, OrderDraft, OrderReplica, ReplicaStore};
use storefront_server::api;
use storefront_server::core::{Config, ServerState};

async fn spawn_server() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_overrides(dir.path().to_string_lossy().to_string(), 0, 0);
    let state = ServerState::initialize_direct(&config).await.unwrap();
    let app = api::build_app().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}"), dir)
}

fn draft() -> OrderDraft {
    OrderDraft {
        items: vec![CartItemInput {
            product_id: "margherita".into(),
            name: "Margherita".into(),
            base_price: 1200.0,
            size: Size::Medium,
            crust: Crust {
                name: "Stuffed".into(),
                surcharge: 350.0,
            },
            add_ons: vec![],
            quantity: 1,
        }],
        coupon_code: None,
        address: DeliveryAddress {
            name: "Ada".into(),
            phone: "555-0100".into(),
            email: None,
            street: "1 Loop Rd".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
        },
        payment: PaymentInfo {
            method: PaymentMethod::Online,
            paid: true,
        },
        timing: DeliveryTiming::Asap,
        instructions: Some("ring twice".into()),
    }
}

#[tokio::test]
async fn replica_mirrors_simulated_advances_into_the_canonical_store() {
    let (base_url, _server_dir) = spawn_server().await;
    let client = ApiClient::new(&base_url);

    let order = client.create_order(&draft()).await.unwrap();
    assert_eq!(order.current_stage, Stage::Placed);
    assert_eq!(order.subtotal, 1790.0);
    let order_id = order.id;

    let store = ReplicaStore::open_in_memory().unwrap();
    let config = ClientConfig {
        scope: "checkout".into(),
        advance_interval: Duration::from_millis(40),
        staleness_threshold: Duration::from_secs(3600),
        delivered_grace: Duration::from_millis(50),
        archive_capacity: 10,
    };
    let replica =
        OrderReplica::activate(store.clone(), Some(client.clone()), config, order).unwrap();

    // 4 simulated advances at 40ms, plus grace and mirror latency
    tokio::time::sleep(Duration::from_millis(800)).await;

    // The canonical store converged with the replica's animation
    let canonical = client.get_order(order_id).await.unwrap();
    assert_eq!(canonical.current_stage, Stage::Delivered);
    assert_eq!(canonical.status_history.len(), 5);

    // The replica archived itself after the grace delay
    assert!(replica.current().is_none());
    let archived = replica.archived().unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, order_id);
}

#[tokio::test]
async fn mirror_failure_does_not_stop_the_animation() {
    // Point the mirror at a dead endpoint: every push is dropped, the
    // local animation still completes.
    let client = ApiClient::new("http://127.0.0.1:9");

    let store = ReplicaStore::open_in_memory().unwrap();
    let config = ClientConfig {
        scope: "offline".into(),
        advance_interval: Duration::from_millis(20),
        staleness_threshold: Duration::from_secs(3600),
        delivered_grace: Duration::from_millis(40),
        archive_capacity: 10,
    };

    let mut order = draft_order();
    order.id = 42;
    let replica = OrderReplica::activate(store, Some(client), config, order).unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(replica.archived().unwrap().len(), 1);
}

fn draft_order() -> shared::order::Order {
    use shared::order::StatusEntry;
    use shared::util::now_millis;

    let now = now_millis();
    shared::order::Order {
        id: 1,
        user_id: None,
        items: vec![],
        subtotal: 0.0,
        discount: None,
        total: 0.0,
        address: draft().address,
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
