//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//! 1. Built-in defaults.
//! 2. An optional TOML file.
//! 3. Environment variables under a prefix.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::TrellisConfig;
use crate::error::ConfigError;

/// The layered loader.
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("trellis.toml")?
///     .with_env_prefix("TRELLIS")
///     .load();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: TrellisConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a TOML configuration file over the current layer.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, unreadable, or not valid TOML for
    /// the configuration schema.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        let file_config: TrellisConfig =
            toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?;
        self.merge(file_config);
        Ok(self)
    }

    /// Loads a TOML file when it exists; silently continues otherwise.
    ///
    /// # Errors
    ///
    /// Fails only when an existing file cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Enables environment overrides under the given prefix. Recognized:
    /// `<PREFIX>_APP_NAME`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Produces the final configuration.
    #[must_use]
    pub fn load(mut self) -> TrellisConfig {
        if let Some(prefix) = &self.env_prefix {
            if let Ok(name) = env::var(format!("{prefix}_APP_NAME")) {
                if !name.is_empty() {
                    self.config.app.name = name;
                }
            }
        }
        self.config
    }

    /// Non-empty/non-default values from `other` override this layer.
    fn merge(&mut self, other: TrellisConfig) {
        if !other.app.name.is_empty() {
            self.config.app.name = other.app.name;
        }
        for server in other.app.servers {
            match self
                .config
                .app
                .servers
                .iter_mut()
                .find(|s| s.name == server.name)
            {
                Some(existing) => {
                    if server.port > 0 {
                        existing.port = server.port;
                    }
                    if !server.cert_file.is_empty() {
                        existing.cert_file = server.cert_file;
                    }
                    if !server.key_file.is_empty() {
                        existing.key_file = server.key_file;
                    }
                    if server.debug.is_some() {
                        existing.debug = server.debug;
                    }
                    if server.shutdown_timeout_ms > 0 {
                        existing.shutdown_timeout_ms = server.shutdown_timeout_ms;
                    }
                }
                None => self.config.app.servers.push(server),
            }
        }
        self.config.app.breakers.extend(other.app.breakers);
        self.config.app.limiters.extend(other.app.limiters);
        if other.app.cors.is_some() {
            self.config.app.cors = other.app.cors;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_optional_file_is_fine() {
        let config = ConfigLoader::new()
            .with_optional_file("/definitely/not/here.toml")
            .unwrap()
            .load();
        assert!(config.app.servers.is_empty());
    }

    #[test]
    fn missing_required_file_errors() {
        let err = ConfigLoader::new()
            .with_file("/definitely/not/here.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[app]\nname = \"from-file\"\n\n[[app.servers]]\nname = \"api\"\nport = 7000\n"
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load();
        assert_eq!(config.app.name, "from-file");
        assert_eq!(config.app.servers[0].port, 7000);
    }

    #[test]
    fn second_file_merges_by_server_name() {
        let mut base = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            base,
            "[[app.servers]]\nname = \"api\"\nport = 7000\ndebug = true\n"
        )
        .unwrap();
        let mut overlay = tempfile::NamedTempFile::new().unwrap();
        writeln!(overlay, "[[app.servers]]\nname = \"api\"\nport = 8000\n").unwrap();

        let config = ConfigLoader::new()
            .with_file(base.path())
            .unwrap()
            .with_file(overlay.path())
            .unwrap()
            .load();
        assert_eq!(config.app.servers.len(), 1);
        assert_eq!(config.app.servers[0].port, 8000);
        // Unset fields in the overlay keep the base values.
        assert_eq!(config.app.servers[0].debug, Some(true));
    }

    #[test]
    fn malformed_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_override_wins() {
        let key = "TRELLIS_LOADER_TEST_APP_NAME";
        std::env::set_var(key, "from-env");
        let config = ConfigLoader::new()
            .with_env_prefix("TRELLIS_LOADER_TEST")
            .load();
        std::env::remove_var(key);
        assert_eq!(config.app.name, "from-env");
    }
}
