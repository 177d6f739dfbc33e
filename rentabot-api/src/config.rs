//! API configuration, loaded from environment variables with development
//! defaults.

use std::net::SocketAddr;

use crate::error::{ApiError, ApiResult};

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind.
    pub bind: String,

    /// Port to bind.
    pub port: u16,

    /// Path to the resource descriptor YAML file. `None` starts the server
    /// with an empty catalog.
    pub descriptor_path: Option<String>,

    /// When true the legacy path prefix answers 307 redirects to the primary
    /// prefix instead of serving the routes with a deprecation header.
    pub legacy_redirect: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            descriptor_path: None,
            legacy_redirect: false,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `RENTABOT_RESOURCE_DESCRIPTOR`: descriptor file path
    /// - `RENTABOT_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` / `RENTABOT_PORT`: bind port (default: 8000)
    /// - `RENTABOT_LEGACY_REDIRECT`: "true" enables the 307 redirect of the
    ///   legacy prefix (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = std::env::var("RENTABOT_BIND").unwrap_or(defaults.bind);

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("RENTABOT_PORT").ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.port);

        let descriptor_path = std::env::var("RENTABOT_RESOURCE_DESCRIPTOR").ok();

        let legacy_redirect = std::env::var("RENTABOT_LEGACY_REDIRECT")
            .ok()
            .map(|value| value.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            bind,
            port,
            descriptor_path,
            legacy_redirect,
        }
    }

    /// Resolve the bind address.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}
