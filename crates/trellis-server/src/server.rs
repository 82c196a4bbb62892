//! Logical servers.
//!
//! A [`Server`] groups endpoints behind one listener: name, port, optional
//! TLS material, debug flag, and shutdown timeout. Building a server
//! mounts every endpoint and freezes the section tree into a
//! [`BoundServer`] ready to serve.

use std::sync::Arc;
use std::time::Duration;

use trellis_config::ServerSettings;

use crate::dispatcher::Dispatcher;
use crate::endpoint::{Endpoint, MountableEndpoint, MountResources};
use crate::error::BuildError;
use crate::pipeline::ErrorHandler;
use trellis_bind::Record;

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A logical server: a named endpoint group with its listener settings.
pub struct Server {
    name: String,
    port: u16,
    cert_file: String,
    key_file: String,
    debug: bool,
    shutdown_timeout: Duration,
    error_handler: Option<ErrorHandler>,
    endpoints: Vec<MountableEndpoint>,
}

impl Server {
    /// Creates a server with defaults: port 0 (scheme default), cleartext,
    /// debug off, 10s shutdown timeout.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: 0,
            cert_file: String::new(),
            key_file: String::new(),
            debug: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            error_handler: None,
            endpoints: Vec::new(),
        }
    }

    /// Sets the listen port. Zero picks 80 for cleartext, 443 for TLS.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Configures TLS material. Non-empty paths switch the scheme default
    /// port to 443.
    #[must_use]
    pub fn tls(mut self, cert_file: impl Into<String>, key_file: impl Into<String>) -> Self {
        self.cert_file = cert_file.into();
        self.key_file = key_file.into();
        self
    }

    /// Enables endpoint input/output debug logging.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Overrides the server-level default error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn endpoint<I: Record, O: Record>(mut self, endpoint: Endpoint<I, O>) -> Self {
        self.endpoints.push(MountableEndpoint::new(endpoint));
        self
    }

    /// The server's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether TLS material is configured.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        !self.cert_file.is_empty() && !self.key_file.is_empty()
    }

    /// The effective listen port: the configured port, else 443 with TLS,
    /// else 80.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        if self.port != 0 {
            self.port
        } else if self.is_tls() {
            443
        } else {
            80
        }
    }

    pub(crate) fn push_endpoint(&mut self, endpoint: MountableEndpoint) {
        self.endpoints.push(endpoint);
    }

    /// Overlays configuration-file settings onto this server.
    pub(crate) fn apply_settings(&mut self, settings: &ServerSettings) {
        if settings.port > 0 {
            self.port = settings.port;
        }
        if !settings.cert_file.is_empty() {
            self.cert_file = settings.cert_file.clone();
        }
        if !settings.key_file.is_empty() {
            self.key_file = settings.key_file.clone();
        }
        if let Some(debug) = settings.debug {
            self.debug = debug;
        }
        if settings.shutdown_timeout_ms > 0 {
            self.shutdown_timeout = Duration::from_millis(settings.shutdown_timeout_ms);
        }
    }

    /// Mounts every endpoint and freezes the routing table.
    pub(crate) fn build(self, resources: &MountResources) -> Result<BoundServer, Vec<BuildError>> {
        let mut errors = Vec::new();
        let mut specs = Vec::new();

        let error_handler = self
            .error_handler
            .clone()
            .unwrap_or_else(|| resources.error_handler.clone());
        let endpoint_resources = MountResources {
            codecs: resources.codecs.clone(),
            decrypters: resources.decrypters.clone(),
            identifiers: resources.identifiers.clone(),
            validators: resources.validators.clone(),
            breakers: resources.breakers.clone(),
            limiters: resources.limiters.clone(),
            cors: resources.cors.clone(),
            error_handler: error_handler.clone(),
        };

        let mut seen = std::collections::HashSet::new();
        for endpoint in self.endpoints {
            if !seen.insert(endpoint.name.clone()) {
                errors.push(BuildError::DuplicateEndpoint {
                    server: self.name.clone(),
                    endpoint: endpoint.name,
                });
                continue;
            }
            match endpoint.mount(&endpoint_resources, self.debug) {
                Ok(spec) => specs.push(spec),
                Err(err) => errors.push(err),
            }
        }

        let dispatcher = match Dispatcher::new(specs, error_handler) {
            Ok(dispatcher) => Some(dispatcher),
            Err(mut route_errors) => {
                errors.append(&mut route_errors);
                None
            }
        };

        match (dispatcher, errors.is_empty()) {
            (Some(dispatcher), true) => Ok(BoundServer {
                name: self.name,
                port: if self.port != 0 {
                    self.port
                } else if !self.cert_file.is_empty() && !self.key_file.is_empty() {
                    443
                } else {
                    80
                },
                tls: !self.cert_file.is_empty() && !self.key_file.is_empty(),
                cert_file: self.cert_file,
                key_file: self.key_file,
                shutdown_timeout: self.shutdown_timeout,
                dispatcher: Arc::new(dispatcher),
            }),
            _ => Err(errors),
        }
    }
}

/// A built server: frozen routing table plus listener settings.
pub struct BoundServer {
    /// The server's name.
    pub name: String,
    /// The effective listen port.
    pub port: u16,
    /// Whether the listener is TLS.
    pub tls: bool,
    /// TLS certificate path (empty for cleartext).
    pub cert_file: String,
    /// TLS key path (empty for cleartext).
    pub key_file: String,
    /// Graceful shutdown timeout.
    pub shutdown_timeout: Duration,
    /// The request dispatcher.
    pub dispatcher: Arc<Dispatcher>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults() {
        let server = Server::new("s");
        assert_eq!(server.effective_port(), 80);

        let server = Server::new("s").port(8080);
        assert_eq!(server.effective_port(), 8080);

        let server = Server::new("s").tls("/c.pem", "/k.pem");
        assert_eq!(server.effective_port(), 443);

        let server = Server::new("s").tls("/c.pem", "/k.pem").port(9443);
        assert_eq!(server.effective_port(), 9443);
    }

    #[test]
    fn settings_overlay() {
        let mut server = Server::new("s");
        server.apply_settings(&ServerSettings {
            name: "s".into(),
            port: 7070,
            cert_file: String::new(),
            key_file: String::new(),
            debug: Some(true),
            shutdown_timeout_ms: 2500,
        });
        assert_eq!(server.effective_port(), 7070);
        assert!(server.debug);
        assert_eq!(server.shutdown_timeout, Duration::from_millis(2500));
    }
}
