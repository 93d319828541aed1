//! HTTP server lifecycle

use tokio::net::TcpListener;

use crate::api;
use crate::core::ServerState;
use crate::utils::AppError;

pub struct Server {
    state: ServerState,
}

impl Server {
    pub fn new(state: ServerState) -> Self {
        Self { state }
    }

    /// Serve the HTTP API until ctrl-c, then shut the broker down.
    pub async fn run(self) -> Result<(), AppError> {
        let addr = format!("0.0.0.0:{}", self.state.config.http_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("HTTP API listening on {addr}");

        let broker = self.state.broker.clone();
        let app = api::build_app().with_state(self.state);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await
            .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

        broker.shutdown();
        Ok(())
    }
}
