//! # Trellis
//!
//! A server-side HTTP framework that turns typed endpoint declarations
//! into a running listener. Declare endpoints — pattern, methods, typed
//! input and output records, an async handler — mount them on named
//! servers, and the framework owns routing, body parsing, validation,
//! traffic control, serialization, error formatting, and graceful
//! shutdown.
//!
//! ## The pieces
//!
//! - **Routing** ([`trellis_router`]): a weighted section tree resolving a
//!   method + path among overlapping patterns (static, regex, named,
//!   named-regex, typed-format, wildcard); deeper wins, then weight.
//! - **Binding & validation** ([`trellis_bind`]): `#[derive(Record)]`
//!   compiles field attributes into descriptors; the binder populates
//!   inputs from path/query/header/cookie/body, and `validate` fragments
//!   compile into per-field rules at mount time.
//! - **Codecs** ([`trellis_codec`]): per-application serializer registry;
//!   JSON and multipart built in; JSON for anything unknown.
//! - **Traffic control** ([`trellis_guard`]): recover, circuit breaker,
//!   dual token-bucket rate limiting, CORS — composed outside-in around
//!   every handler.
//! - **Serving** ([`trellis_server`]): endpoint assembly, dispatch,
//!   HTTP/1.1 + h2c listener, signal-driven graceful shutdown.
//! - **Configuration** ([`trellis_config`]): defaults → TOML file → env.
//!
//! ## Example
//!
//! ```ignore
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//! use trellis::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Record)]
//! struct GetUser {
//!     #[record(path = "id")]
//!     id: i64,
//! }
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Record)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     trellis::telemetry::init_logging(false);
//!
//!     let app = App::new("demo")
//!         .server(Server::new("public").port(8080))
//!         .mount(
//!             Endpoint::new("getUser", "/users/{id}", [Method::GET], |_ctx, input: GetUser| async move {
//!                 Ok(User { id: input.id, name: "ada".into() })
//!             }),
//!             "public",
//!         )
//!         .build()?;
//!
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod telemetry;

pub use trellis_bind as bind;
pub use trellis_codec as codec;
pub use trellis_config as config;
pub use trellis_guard as guard;
pub use trellis_router as router;
pub use trellis_server as server;

pub use trellis_bind::{NoContent, Record as RecordTrait};
pub use trellis_codec::{CodecRegistry, MediaType};
pub use trellis_config::{ConfigLoader, TrellisConfig};
pub use trellis_core::{Context, PathParams, Problem};
pub use trellis_guard::{CorsConfig, Interceptor};
pub use trellis_macros::Record;
pub use trellis_router::Router;
pub use trellis_server::{App, BuiltApp, Endpoint, Server};

/// The common imports.
pub mod prelude {
    pub use crate::telemetry;
    pub use trellis_bind::NoContent;
    pub use trellis_config::{ConfigLoader, TrellisConfig};
    pub use trellis_core::{Context, Problem};
    pub use trellis_macros::Record;
    pub use trellis_server::{App, Endpoint, Server};
}
