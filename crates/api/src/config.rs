//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::reconciler::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use saga::{ReconcilerConfig, ServiceEndpoints};

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Gateway configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` - bind address (default: `"0.0.0.0"`)
/// - `PORT` - listen port (default: `8080`)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` - `text` or `json` (default: `text`)
/// - `AIRLINESHUB_URL`, `EXCHANGE_URL`, `FIDELITY_URL` - collaborator base URLs
/// - `RECONCILE_INTERVAL_SECS` - pending-credit sweep period (default: `10`)
/// - `RECONCILE_MAX_ATTEMPTS` - delivery attempts per credit (default: `20`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub airlineshub_url: String,
    pub exchange_url: String,
    pub fidelity_url: String,
    pub reconcile_interval: Duration,
    pub reconcile_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let url = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            airlineshub_url: url("AIRLINESHUB_URL").unwrap_or(defaults.airlineshub_url),
            exchange_url: url("EXCHANGE_URL").unwrap_or(defaults.exchange_url),
            fidelity_url: url("FIDELITY_URL").unwrap_or(defaults.fidelity_url),
            reconcile_interval: parsed("RECONCILE_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            reconcile_max_attempts: parsed("RECONCILE_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.reconcile_max_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints {
            airlineshub_url: self.airlineshub_url.clone(),
            exchange_url: self.exchange_url.clone(),
            fidelity_url: self.fidelity_url.clone(),
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: self.reconcile_interval,
            max_attempts: self.reconcile_max_attempts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let endpoints = ServiceEndpoints::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            airlineshub_url: endpoints.airlineshub_url,
            exchange_url: endpoints.exchange_url,
            fidelity_url: endpoints.fidelity_url,
            reconcile_interval: DEFAULT_INTERVAL,
            reconcile_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.airlineshub_url, "http://localhost:8081");
        assert_eq!(config.exchange_url, "http://localhost:8082");
        assert_eq!(config.fidelity_url, "http://localhost:8083");
        assert_eq!(config.reconcile_interval, Duration::from_secs(10));
        assert_eq!(config.reconcile_max_attempts, 20);
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.reconciler_config(), ReconcilerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("AIRLINESHUB_URL", "http://airlineshub:8081"),
            ("EXCHANGE_URL", "http://exchange:8082"),
            ("FIDELITY_URL", "http://fidelity:8083"),
            ("RECONCILE_INTERVAL_SECS", "3"),
            ("RECONCILE_MAX_ATTEMPTS", "5"),
        ]));

        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);

        let endpoints = config.endpoints();
        assert_eq!(endpoints.airlineshub_url, "http://airlineshub:8081");
        assert_eq!(endpoints.exchange_url, "http://exchange:8082");
        assert_eq!(endpoints.fidelity_url, "http://fidelity:8083");

        let reconciler = config.reconciler_config();
        assert_eq!(reconciler.interval, Duration::from_secs(3));
        assert_eq!(reconciler.max_attempts, 5);
    }

    #[test]
    fn test_empty_urls_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("AIRLINESHUB_URL", ""),
            ("EXCHANGE_URL", "  "),
            ("FIDELITY_URL", "http://fidelity:8083"),
        ]));
        assert_eq!(config.airlineshub_url, "http://localhost:8081");
        assert_eq!(config.exchange_url, "http://localhost:8082");
        assert_eq!(config.fidelity_url, "http://fidelity:8083");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("RECONCILE_INTERVAL_SECS", "0"),
            ("RECONCILE_MAX_ATTEMPTS", "-1"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.reconcile_interval, Duration::from_secs(10));
        assert_eq!(config.reconcile_max_attempts, 20);
    }
}
