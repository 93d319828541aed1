use storefront_server::core::{Config, Server, ServerState};
use storefront_server::utils::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logger::init_logger();

    let config = Config::from_env();
    tracing::info!(
        environment = %config.environment,
        http_port = config.http_port,
        broker_tcp_port = config.broker_tcp_port,
        "Starting storefront server"
    );

    let state = ServerState::initialize(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Initialization failed: {e}"))?;
    state.start_background_tasks();

    Server::new(state)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {e}"))?;

    Ok(())
}
