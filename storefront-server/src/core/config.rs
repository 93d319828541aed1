//! Server configuration
//!
//! All settings come from environment variables with sensible development
//! defaults:
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | WORK_DIR | /var/lib/storefront | working directory (database, logs) |
//! | HTTP_PORT | 3000 | HTTP API port |
//! | BROKER_TCP_PORT | 8081 | broker subscriber port |
//! | BRIDGE_URL | http://127.0.0.1:HTTP_PORT | where the mutation layer reaches the bridge |
//! | BRIDGE_SECRET | (dev default) | shared secret for the bridge, delivered out-of-band |
//! | JWT_SECRET | (dev default) | session token verification key |
//! | EMAIL_ENDPOINT | unset | mail API URL; unset disables email |
//! | ENVIRONMENT | development | development \| staging \| production |

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub broker_tcp_port: u16,
    /// Base URL the stateless mutation layer uses to reach the bridge.
    pub bridge_url: String,
    /// Coarse capability token gating the bridge; rotate by redeploying
    /// both sides.
    pub bridge_secret: String,
    pub jwt_secret: String,
    pub email_endpoint: Option<String>,
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let http_port = std::env::var("HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/storefront".into()),
            http_port,
            broker_tcp_port: std::env::var("BROKER_TCP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8081),
            bridge_url: std::env::var("BRIDGE_URL")
                .unwrap_or_else(|_| format!("http://127.0.0.1:{http_port}")),
            bridge_secret: std::env::var("BRIDGE_SECRET")
                .unwrap_or_else(|_| "dev-bridge-secret".into()),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-jwt-secret".into()),
            email_endpoint: std::env::var("EMAIL_ENDPOINT").ok().filter(|v| !v.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Override the paths and ports that matter in tests.
    pub fn with_overrides(
        work_dir: impl Into<String>,
        http_port: u16,
        broker_tcp_port: u16,
    ) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.broker_tcp_port = broker_tcp_port;
        config.bridge_url = format!("http://127.0.0.1:{http_port}");
        config
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("storefront.db")
    }

    /// Create the working directory layout if missing.
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
