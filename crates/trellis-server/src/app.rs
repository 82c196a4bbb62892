//! The application: registries, servers, mounting, and the run loop.
//!
//! An [`App`] collects the build-time registries (codecs, decrypters,
//! client identifiers, custom validators), the configuration, and one or
//! more servers. [`App::build`] applies configuration, mounts every
//! endpoint, and aggregates every violation into one error; the resulting
//! [`BuiltApp`] serves until a shutdown signal and then drains.

use std::sync::Arc;

use trellis_bind::{CustomValidators, Decrypter, DecrypterRegistry, Record, RuleFactory};
use trellis_codec::{Codec, CodecRegistry};
use trellis_config::TrellisConfig;
use trellis_guard::{ClientIdentifier, CorsConfig, IdentifierRegistry};

use crate::endpoint::{Endpoint, MountableEndpoint, MountResources};
use crate::error::{BuildError, BuildErrors, ServeError};
use crate::listener;
use crate::pipeline::{default_error_handler, ErrorHandler};
use crate::server::{BoundServer, Server};
use crate::shutdown::ShutdownSignal;

/// The application under construction.
pub struct App {
    name: String,
    config: TrellisConfig,
    codecs: CodecRegistry,
    decrypters: DecrypterRegistry,
    identifiers: IdentifierRegistry,
    validators: CustomValidators,
    error_handler: Option<ErrorHandler>,
    servers: Vec<Server>,
    mounts: Vec<(String, MountableEndpoint)>,
}

impl App {
    /// Creates an application with default registries and empty
    /// configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: TrellisConfig::default(),
            codecs: CodecRegistry::new(),
            decrypters: DecrypterRegistry::new(),
            identifiers: IdentifierRegistry::new(),
            validators: CustomValidators::new(),
            error_handler: None,
            servers: Vec::new(),
            mounts: Vec::new(),
        }
    }

    /// Creates an application from loaded configuration; the name falls
    /// back to the process basename.
    #[must_use]
    pub fn from_config(config: TrellisConfig) -> Self {
        let name = config.resolved_name();
        let mut app = Self::new(name);
        app.config = config;
        app
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: TrellisConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a codec. Build-time only; the registry freezes at build.
    #[must_use]
    pub fn register_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.register(codec);
        self
    }

    /// Registers a payload decrypter under an algorithm name.
    #[must_use]
    pub fn register_decrypter(mut self, name: impl Into<String>, decrypter: Decrypter) -> Self {
        self.decrypters.register(name, decrypter);
        self
    }

    /// Registers a client identifier for per-client rate limiting.
    #[must_use]
    pub fn register_identifier(
        mut self,
        name: impl Into<String>,
        identifier: ClientIdentifier,
    ) -> Self {
        self.identifiers.register(name, identifier);
        self
    }

    /// Registers a custom validator factory.
    #[must_use]
    pub fn register_validator(mut self, factory: Arc<dyn RuleFactory>) -> Self {
        self.validators.register(factory);
        self
    }

    /// Overrides the application-wide default error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Adds a server.
    #[must_use]
    pub fn server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    /// Mounts an endpoint onto a named server. An empty name targets the
    /// first server (creating a default `<app>_server` when none exist).
    #[must_use]
    pub fn mount<I: Record, O: Record>(
        mut self,
        endpoint: Endpoint<I, O>,
        server: impl Into<String>,
    ) -> Self {
        self.mounts
            .push((server.into(), MountableEndpoint::new(endpoint)));
        self
    }

    /// Applies configuration, mounts endpoints, and freezes every server.
    ///
    /// # Errors
    ///
    /// Aggregates every mount-time violation: duplicate server or endpoint
    /// names, unknown mount targets, invalid patterns and methods,
    /// duplicate routes, validator compilation failures.
    pub fn build(mut self) -> Result<BuiltApp, BuildErrors> {
        let mut errors = Vec::new();

        // Fold configured servers in: update matching servers, create the
        // rest.
        for settings in &self.config.app.servers {
            if settings.name.is_empty() {
                errors.push(BuildError::UnnamedServer);
                continue;
            }
            match self.servers.iter_mut().find(|s| s.name() == settings.name) {
                Some(server) => server.apply_settings(settings),
                None => {
                    let mut server = Server::new(settings.name.clone());
                    server.apply_settings(settings);
                    self.servers.push(server);
                }
            }
        }

        if self.servers.is_empty() {
            self.servers
                .push(Server::new(format!("{}_server", self.name)));
        }

        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.name().to_string()) {
                errors.push(BuildError::DuplicateServer {
                    server: server.name().to_string(),
                });
            }
        }

        // Distribute deferred mounts.
        for (target, endpoint) in self.mounts {
            let slot = if target.is_empty() {
                self.servers.first_mut()
            } else {
                self.servers.iter_mut().find(|s| s.name() == target)
            };
            match slot {
                Some(server) => server.push_endpoint(endpoint),
                None => errors.push(BuildError::UnknownServer {
                    server: target,
                    endpoint: endpoint.name,
                }),
            }
        }

        let codecs = Arc::new(self.codecs);
        let error_handler = self
            .error_handler
            .unwrap_or_else(|| default_error_handler(codecs.clone()));
        let resources = MountResources {
            codecs,
            decrypters: Arc::new(self.decrypters),
            identifiers: Arc::new(self.identifiers),
            validators: Arc::new(self.validators),
            breakers: self.config.app.breakers.clone(),
            limiters: self.config.app.limiters.clone(),
            cors: self.config.app.cors.as_ref().map(|c| CorsConfig {
                allow_origins: c.allow_origins.clone(),
                allow_methods: c.allow_methods.clone(),
                allow_headers: c.allow_headers.clone(),
                allow_credentials: c.allow_credentials,
                max_age: c.max_age,
            }),
            error_handler,
        };

        let mut bound = Vec::new();
        for server in self.servers {
            match server.build(&resources) {
                Ok(server) => bound.push(server),
                Err(mut server_errors) => errors.append(&mut server_errors),
            }
        }

        if errors.is_empty() {
            Ok(BuiltApp {
                name: self.name,
                servers: bound,
            })
        } else {
            Err(BuildErrors::new(errors))
        }
    }
}

/// A built application, ready to serve.
pub struct BuiltApp {
    name: String,
    servers: Vec<BoundServer>,
}

impl BuiltApp {
    /// The application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The built servers.
    #[must_use]
    pub fn servers(&self) -> &[BoundServer] {
        &self.servers
    }

    /// Looks up a built server by name.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&BoundServer> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Serves every server until SIGINT/SIGTERM, then drains.
    ///
    /// The signal handler is installed before any listener starts
    /// accepting, so an early signal still shuts down cleanly.
    pub async fn run(self) -> Result<(), ServeError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_until(shutdown).await
    }

    /// Serves every server until the given signal fires. Exposed for
    /// embedding and tests.
    pub async fn run_until(self, shutdown: ShutdownSignal) -> Result<(), ServeError> {
        tracing::info!(app = %self.name, servers = self.servers.len(), "starting");

        // TLS/HTTP-3 bring-up is an external transport; the dispatcher
        // itself is transport-agnostic. Refuse before any listener starts.
        if let Some(server) = self.servers.iter().find(|s| s.tls) {
            return Err(ServeError::TlsTransportMissing {
                server: server.name.clone(),
            });
        }

        let mut tasks = Vec::new();
        for server in self.servers {
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                listener::serve_cleartext(server, shutdown).await
            }));
        }

        for task in tasks {
            match task.await {
                Ok(result) => result?,
                Err(err) => tracing::error!(error = %err, "server task aborted"),
            }
        }
        Ok(())
    }
}
