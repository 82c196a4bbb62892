//! Request/response types flowing through the interceptor chain.

use bytes::Bytes;
use http_body_util::Full;

/// The request type inside the chain: headers plus a fully collected body.
pub type Request = http::Request<Bytes>;

/// The response type inside the chain.
pub type Response = http::Response<Full<Bytes>>;

/// The chain's value type: a response, or a structured error for the
/// endpoint's error handler to render. Only the outermost adapter writes
/// error bodies.
pub type Outcome = Result<Response, trellis_core::Problem>;
