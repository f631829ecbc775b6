//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `PRODUCTS_SERVICE_URL` — base URL of the product catalog service
/// - `USERS_SERVICE_URL` — base URL of the identity service
/// - `ORDERS_SERVICE_URL` — base URL of the order service, for deployments
///   where payments run in a separate process
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub products_service_url: Option<String>,
    pub users_service_url: Option<String>,
    pub orders_service_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            products_service_url: std::env::var("PRODUCTS_SERVICE_URL").ok(),
            users_service_url: std::env::var("USERS_SERVICE_URL").ok(),
            orders_service_url: std::env::var("ORDERS_SERVICE_URL").ok(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            products_service_url: None,
            users_service_url: None,
            orders_service_url: None,
        }
    }
}
