//! # Trellis Guard
//!
//! Traffic-control interceptors and their primitives.
//!
//! An [`Interceptor`] is a handler-to-handler transform; a chain composes
//! inside-out with the first interceptor outermost. The fixed built-in
//! order, outermost first:
//!
//! 1. [`RecoverInterceptor`] — catches panics, so nothing below needs
//!    panic safety.
//! 2. [`BreakerInterceptor`] — two-step circuit breaker; observes whether
//!    the downstream outcome was a success (no error, or status < 500).
//! 3. [`RateLimitInterceptor`] — server token bucket plus per-client
//!    sub-limiters; rejects fast with 429, inside the breaker so
//!    rejections don't pollute its statistics.
//! 4. [`CorsInterceptor`] — accumulates response headers, never rejects.
//! 5. User-declared interceptors.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod breaker;
mod cors;
mod identity;
mod interceptor;
mod limiter;
mod recover;
#[cfg(test)]
mod test_util;
mod types;

pub use breaker::{
    BreakerConfig, BreakerError, BreakerInterceptor, CircuitBreaker, Counts, Permit, State,
};
pub use cors::{headers as cors_headers, CorsConfig, CorsInterceptor};
pub use identity::{ip_identifier, ClientIdentifier, IdentifierRegistry};
pub use interceptor::{BoxFuture, Handler, Interceptor, Next};
pub use limiter::{LimiterConfig, RateLimitInterceptor, RateLimiter, TokenBucket};
pub use recover::RecoverInterceptor;
pub use types::{Outcome, Request, Response};
