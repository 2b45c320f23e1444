//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults target a local development setup.
//!
//! - `COFFEEHOUSE_BACKEND_URL` - REST backend base URL (default: `http://localhost:8000/api/v1`)
//! - `COFFEEHOUSE_HOST` - Bind address (default: 127.0.0.1)
//! - `COFFEEHOUSE_PORT` - Listen port (default: 3000)
//! - `COFFEEHOUSE_BASE_URL` - Public URL for the storefront (default: `http://localhost:3000`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of requests traced (default: 0.0)

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api/v1";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Base URL of the REST backend, always ending in `/`
    pub backend_url: Url,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Sentry performance tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = get_or("COFFEEHOUSE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("COFFEEHOUSE_HOST".to_string(), e.to_string()))?;
        let port = get_or("COFFEEHOUSE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("COFFEEHOUSE_PORT".to_string(), e.to_string()))?;
        let base_url = get_or("COFFEEHOUSE_BASE_URL", "http://localhost:3000");
        let backend_url = parse_backend_url(&get_or("COFFEEHOUSE_BACKEND_URL", DEFAULT_BACKEND_URL))?;
        let sentry_traces_sample_rate = get_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            host,
            port,
            base_url,
            backend_url,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
            sentry_traces_sample_rate,
        })
    }

    /// Configuration for a storefront talking to `backend_url`, with defaults
    /// for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `backend_url` is not a valid base URL.
    pub fn for_backend(backend_url: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| (key == "COFFEEHOUSE_BACKEND_URL").then(|| backend_url.to_string()))
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (enables secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Parse the backend base URL, making sure it ends in a slash so that
/// relative endpoint paths are appended rather than replacing the last segment.
fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidEnvVar("COFFEEHOUSE_BACKEND_URL".to_string(), e.to_string())
    })?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "COFFEEHOUSE_BACKEND_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.backend_url.as_str(), "http://localhost:8000/api/v1/");
        assert!(!config.is_secure());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_backend_url_gets_trailing_slash() {
        let config = config_from(&[("COFFEEHOUSE_BACKEND_URL", "https://api.example.test/api/v1")])
            .unwrap();
        assert_eq!(
            config.backend_url.join("auth/me").unwrap().as_str(),
            "https://api.example.test/api/v1/auth/me"
        );
    }

    #[test]
    fn test_invalid_backend_url() {
        let result = config_from(&[("COFFEEHOUSE_BACKEND_URL", "not a url")]);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_invalid_port() {
        let result = config_from(&[("COFFEEHOUSE_PORT", "eighty")]);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(key, _)) if key == "COFFEEHOUSE_PORT"));
    }

    #[test]
    fn test_secure_when_https() {
        let config = config_from(&[("COFFEEHOUSE_BASE_URL", "https://shop.example.test")]).unwrap();
        assert!(config.is_secure());
    }

    #[test]
    fn test_socket_addr() {
        let config = config_from(&[("COFFEEHOUSE_HOST", "0.0.0.0"), ("COFFEEHOUSE_PORT", "8080")])
            .unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_for_backend() {
        let config = StorefrontConfig::for_backend("http://127.0.0.1:9999/api/v1").unwrap();
        assert_eq!(config.backend_url.as_str(), "http://127.0.0.1:9999/api/v1/");
    }
}
