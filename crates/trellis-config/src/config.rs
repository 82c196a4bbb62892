//! Configuration types.
//!
//! The on-disk shape mirrors the runtime objects: an `[app]` table with
//! server entries, per-endpoint breaker and limiter settings keyed by
//! endpoint name, and an optional CORS block. Durations are expressed in
//! milliseconds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// The application section.
    #[serde(default)]
    pub app: AppSection,
}

/// The `[app]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Application name; defaults to the process basename when empty.
    #[serde(default)]
    pub name: String,

    /// Server configurations.
    #[serde(default)]
    pub servers: Vec<ServerSettings>,

    /// Per-endpoint circuit-breaker settings, keyed by endpoint name.
    #[serde(default)]
    pub breakers: HashMap<String, BreakerSettings>,

    /// Per-endpoint rate-limiter settings, keyed by endpoint name.
    #[serde(default)]
    pub limiters: HashMap<String, LimiterSettings>,

    /// CORS settings, applied to every endpoint when present.
    #[serde(default)]
    pub cors: Option<CorsSettings>,
}

/// One server's configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Server name; must be unique across the application.
    pub name: String,

    /// Listen port. Zero picks the scheme default: 80 cleartext, 443 TLS.
    #[serde(default)]
    pub port: u16,

    /// TLS certificate path. Empty means cleartext.
    #[serde(default)]
    pub cert_file: String,

    /// TLS key path. Empty means cleartext.
    #[serde(default)]
    pub key_file: String,

    /// Enables endpoint input/output debug logging.
    #[serde(default)]
    pub debug: Option<bool>,

    /// Graceful shutdown timeout in milliseconds.
    #[serde(default)]
    pub shutdown_timeout_ms: u64,
}

/// Per-breaker settings; zero values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BreakerSettings {
    /// Probes permitted while half-open.
    #[serde(default)]
    pub max_requests: u32,
    /// Closed-state counter reset period, milliseconds.
    #[serde(default)]
    pub interval_ms: u64,
    /// Open-state dwell, milliseconds.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Consecutive failures required to trip.
    #[serde(default)]
    pub max_consecutive_failures: u32,
    /// Failure ratio required to trip.
    #[serde(default)]
    pub failure_ratio: f64,
}

/// Per-limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LimiterSettings {
    /// Server bucket refill rate, tokens per second. Negative = unbounded.
    pub token_rate: f64,
    /// Server bucket capacity.
    pub token_bucket_size: u32,
    /// Client identifier name; empty means the built-in `"IP"`.
    #[serde(default)]
    pub client_identifier_type: String,
    /// Per-client refill rate; absent disables client limiting.
    #[serde(default)]
    pub client_token_rate: Option<f64>,
    /// Per-client bucket capacity.
    #[serde(default)]
    pub client_token_bucket_size: u32,
}

/// CORS settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CorsSettings {
    /// Origin allow-list; `*` wildcards supported.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// `Access-Control-Allow-Methods` value.
    #[serde(default)]
    pub allow_methods: Vec<String>,
    /// `Access-Control-Allow-Headers` value.
    #[serde(default)]
    pub allow_headers: Vec<String>,
    /// `Access-Control-Allow-Credentials`.
    #[serde(default)]
    pub allow_credentials: bool,
    /// `Access-Control-Max-Age` in seconds.
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl TrellisConfig {
    /// The application name, defaulting to the process basename.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        if !self.app.name.is_empty() {
            return self.app.name.clone();
        }
        std::env::args()
            .next()
            .as_deref()
            .map(std::path::Path::new)
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("trellis")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let doc = r#"
            [app]
            name = "orders"

            [[app.servers]]
            name = "public"
            port = 8080
            debug = true
            shutdown_timeout_ms = 5000

            [[app.servers]]
            name = "tls"
            cert_file = "/etc/tls/cert.pem"
            key_file = "/etc/tls/key.pem"

            [app.breakers.getOrder]
            max_requests = 3
            interval_ms = 10000
            timeout_ms = 2000
            max_consecutive_failures = 4
            failure_ratio = 0.5

            [app.limiters.getOrder]
            token_rate = 100.0
            token_bucket_size = 50
            client_identifier_type = "IP"
            client_token_rate = 2.0
            client_token_bucket_size = 2

            [app.cors]
            allow_origins = ["https://app.example.com"]
            allow_methods = ["GET", "POST"]
            allow_credentials = true
            max_age = 600
        "#;

        let config: TrellisConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.app.name, "orders");
        assert_eq!(config.app.servers.len(), 2);
        assert_eq!(config.app.servers[0].port, 8080);
        assert_eq!(config.app.servers[0].debug, Some(true));
        assert_eq!(config.app.servers[1].cert_file, "/etc/tls/cert.pem");
        assert_eq!(config.app.servers[1].port, 0);

        let breaker = &config.app.breakers["getOrder"];
        assert_eq!(breaker.max_requests, 3);
        assert_eq!(breaker.failure_ratio, 0.5);

        let limiter = &config.app.limiters["getOrder"];
        assert_eq!(limiter.client_token_rate, Some(2.0));

        let cors = config.app.cors.unwrap();
        assert!(cors.allow_credentials);
        assert_eq!(cors.max_age, Some(600));
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config: TrellisConfig = toml::from_str("").unwrap();
        assert!(config.app.name.is_empty());
        assert!(config.app.servers.is_empty());
        assert!(config.app.cors.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<TrellisConfig, _> = toml::from_str("[app]\nbogus = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn resolved_name_prefers_configured() {
        let mut config = TrellisConfig::default();
        config.app.name = "billing".to_string();
        assert_eq!(config.resolved_name(), "billing");
    }

    #[test]
    fn resolved_name_falls_back_to_process() {
        let config = TrellisConfig::default();
        assert!(!config.resolved_name().is_empty());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = TrellisConfig::default();
        config.app.name = "svc".into();
        config.app.servers.push(ServerSettings {
            name: "main".into(),
            port: 9000,
            cert_file: String::new(),
            key_file: String::new(),
            debug: None,
            shutdown_timeout_ms: 0,
        });
        let doc = toml::to_string(&config).unwrap();
        let back: TrellisConfig = toml::from_str(&doc).unwrap();
        assert_eq!(back, config);
    }
}
