//! # Trellis Core
//!
//! Foundation types shared by every Trellis crate:
//!
//! - [`Problem`] — the structured error that renders through the negotiated
//!   serializer (`code`, `message`, `status`, optional `cause`).
//! - [`Context`] — per-request state: negotiated media types, captured path
//!   parameters, typed extensions.
//! - [`MediaType`] — the fixed set of recognized media types and the
//!   `Accept`/`Content-Type` negotiation rules.
//! - [`PathParams`] — small-vector storage for route captures.
//! - [`i18n`] — the locale-aware message bundle used for framework-produced
//!   messages.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod i18n;
mod media;
mod params;

pub use context::{Context, Extensions, RequestId};
pub use error::{Problem, ProblemResult};
pub use media::{ContentTypeParams, MediaType};
pub use params::PathParams;
