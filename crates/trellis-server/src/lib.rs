//! # Trellis Server
//!
//! Endpoint assembly, dispatch, and serving.
//!
//! Declare typed endpoints, group them onto named servers, build the
//! application (every mount-time violation is aggregated into one error),
//! and run: requests flow listener → dispatcher → section tree → the
//! endpoint's interceptor chain → binder → validator → handler →
//! serializer, with every error rendered by the endpoint's error handler.
//!
//! ```ignore
//! use trellis_server::{App, Endpoint, Server};
//! use http::Method;
//!
//! let app = App::new("orders")
//!     .server(Server::new("public").port(8080))
//!     .mount(
//!         Endpoint::new("getOrder", "/orders/{id}", [Method::GET], get_order),
//!         "public",
//!     )
//!     .build()?;
//!
//! app.run().await?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod dispatcher;
mod endpoint;
mod error;
mod listener;
mod pipeline;
mod server;
pub mod shutdown;

pub use app::{App, BuiltApp};
pub use dispatcher::Dispatcher;
pub use endpoint::{Endpoint, MountResources};
pub use error::{BuildError, BuildErrors, ServeError};
pub use pipeline::{default_error_handler, EndpointSpec, ErrorHandler, UserHandler};
pub use server::{BoundServer, Server, DEFAULT_SHUTDOWN_TIMEOUT};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
