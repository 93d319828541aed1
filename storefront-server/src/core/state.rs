//! Server state
//!
//! `ServerState` holds shared references to every service; cloning is
//! shallow (Arc fields) and handed to each request handler.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::orders::OrderService;
use crate::realtime::{BridgeClient, Broker, DirectPublisher, EventPublisher};
use crate::services::EmailService;
use crate::utils::AppError;

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    /// The fan-out broker. Request handlers never broadcast through it
    /// directly; the mutation layer goes through its publisher.
    pub broker: Arc<Broker>,
    pub orders: OrderService,
    pub jwt: Arc<JwtService>,
}

impl ServerState {
    /// Initialize with the production publisher: the stateless mutation
    /// layer reaches the broker through the HTTP bridge.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let bridge = Arc::new(BridgeClient::new(
            &config.bridge_url,
            config.bridge_secret.clone(),
        ));
        Self::build(config, |_| bridge).await
    }

    /// Initialize with the broker wired in-process: events skip the HTTP
    /// hop. For single-binary deployments and tests.
    pub async fn initialize_direct(config: &Config) -> Result<Self, AppError> {
        Self::build(config, |broker| Arc::new(DirectPublisher::new(broker.clone()))).await
    }

    /// Initialize with a caller-supplied publisher.
    pub async fn initialize_with_publisher(
        config: &Config,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, AppError> {
        Self::build(config, |_| publisher).await
    }

    async fn build<F>(config: &Config, make_publisher: F) -> Result<Self, AppError>
    where
        F: FnOnce(&Arc<Broker>) -> Arc<dyn EventPublisher>,
    {
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::internal(format!("Failed to create work dir: {e}")))?;

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        let broker = Arc::new(Broker::new());
        let publisher = make_publisher(&broker);
        let mailer = EmailService::new(config.email_endpoint.clone());
        let orders = OrderService::new(db.pool.clone(), publisher, mailer);

        Ok(Self {
            config: config.clone(),
            pool: db.pool,
            broker,
            orders,
            jwt: Arc::new(JwtService::new(&config.jwt_secret)),
        })
    }

    /// Start background tasks; call before `Server::run()`.
    ///
    /// Spawns the broker's subscriber accept loop.
    pub fn start_background_tasks(&self) {
        let broker = Arc::clone(&self.broker);
        let addr = format!("0.0.0.0:{}", self.config.broker_tcp_port);
        tokio::spawn(async move {
            if let Err(e) = broker.serve_tcp(&addr).await {
                tracing::error!(error = %e, "Broker accept loop failed");
            }
        });
    }
}
