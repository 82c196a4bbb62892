//! # Trellis Config
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then environment overrides. The schema covers the application name,
//! server listeners, per-endpoint breaker and limiter settings, and CORS.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    AppSection, BreakerSettings, CorsSettings, LimiterSettings, ServerSettings, TrellisConfig,
};
pub use error::ConfigError;
pub use loader::ConfigLoader;
