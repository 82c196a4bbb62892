//! Build-time and serve-time errors.
//!
//! All mount-time invariant violations surface as build errors, aggregated
//! so one build run reports every problem instead of aborting at the first.

use trellis_bind::BuildError as ValidatorBuildError;
use trellis_router::RouterBuildError;

/// One mount-time invariant violation.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An endpoint was declared without a name.
    #[error("endpoint with pattern '{pattern}' has no name")]
    UnnamedEndpoint {
        /// The endpoint's pattern.
        pattern: String,
    },

    /// An endpoint was declared without methods.
    #[error("endpoint '{endpoint}' declares no methods")]
    NoMethods {
        /// The endpoint's name.
        endpoint: String,
    },

    /// Two endpoints on one server share a name.
    #[error("duplicate endpoint name '{endpoint}' on server '{server}'")]
    DuplicateEndpoint {
        /// The server.
        server: String,
        /// The duplicated name.
        endpoint: String,
    },

    /// Two servers share a name.
    #[error("duplicate server name '{server}'")]
    DuplicateServer {
        /// The duplicated name.
        server: String,
    },

    /// A configured server entry has no name.
    #[error("a configured server entry has an empty name")]
    UnnamedServer,

    /// An endpoint was mounted onto a server that does not exist.
    #[error("cannot mount endpoint '{endpoint}': server '{server}' is not defined")]
    UnknownServer {
        /// The target server name.
        server: String,
        /// The endpoint.
        endpoint: String,
    },

    /// Route registration failed (duplicate route, bad pattern or method).
    #[error("endpoint '{endpoint}': {source}")]
    Route {
        /// The endpoint.
        endpoint: String,
        /// The router failure.
        #[source]
        source: RouterBuildError,
    },

    /// Validator compilation failed.
    #[error("endpoint '{endpoint}': {source}")]
    Validator {
        /// The endpoint.
        endpoint: String,
        /// The validator failure.
        #[source]
        source: ValidatorBuildError,
    },
}

/// Every violation found during an application build.
#[derive(Debug, thiserror::Error)]
#[error("application build failed with {} error(s)", errors.len())]
pub struct BuildErrors {
    /// The individual violations.
    pub errors: Vec<BuildError>,
}

impl BuildErrors {
    /// Wraps a non-empty violation list.
    #[must_use]
    pub fn new(errors: Vec<BuildError>) -> Self {
        Self { errors }
    }
}

/// Serve-time failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Binding the listen socket failed.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// The address.
        addr: std::net::SocketAddr,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed fatally.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The server was configured for TLS but this build only provides the
    /// cleartext listener; TLS/HTTP-3 bring-up plugs in at the transport
    /// seam.
    #[error("server '{server}' is configured for TLS; no TLS transport is wired in")]
    TlsTransportMissing {
        /// The server.
        server: String,
    },
}
