//! Structured errors for Trellis.
//!
//! Every failure that can reach a client is a [`Problem`]: a flat record of
//! machine-readable `code`, human-readable `message`, HTTP `status`, and an
//! optional nested `cause`. Problems serialize through the negotiated
//! serializer, so the same value renders as JSON, multipart fields, etc.
//!
//! # Example
//!
//! ```
//! use trellis_core::Problem;
//!
//! fn lookup(id: u64) -> Result<String, Problem> {
//!     if id == 0 {
//!         return Err(Problem::not_found("no such user"));
//!     }
//!     Ok(format!("user-{id}"))
//! }
//!
//! let err = lookup(0).unwrap_err();
//! assert_eq!(err.status, 404);
//! assert_eq!(err.code, "NOT_FOUND");
//! ```

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::i18n::{self, MessageId};

/// Result type alias using [`Problem`].
pub type ProblemResult<T> = Result<T, Problem>;

/// The canonical structured error.
///
/// Carries everything the error-handler adapter needs to write a response:
/// the application-defined `code`, a resolved `message`, the HTTP `status`,
/// and an optional nested `cause` chain.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct Problem {
    /// Machine-readable error code (e.g. `RATE_LIMITED`).
    pub code: String,

    /// Human-readable, locale-resolved message.
    pub message: String,

    /// HTTP status to respond with. `0` means "unset"; the error-handler
    /// adapter maps unset to 500.
    pub status: u16,

    /// Underlying cause, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[source]
    pub cause: Option<Box<Problem>>,
}

impl Problem {
    /// Creates a problem with an explicit code, message and status.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
            cause: None,
        }
    }

    /// A 400 bad-request problem.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message, 400)
    }

    /// A 400 problem naming the offending input field.
    ///
    /// The code carries the field name so clients can key on it without
    /// parsing the message.
    #[must_use]
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::new(format!("INVALID_{}", field.to_uppercase()), message, 400)
    }

    /// A 404 not-found problem.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message, 404)
    }

    /// The built-in 429 problem produced by the rate limiter.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new("RATE_LIMITED", i18n::message(MessageId::TooManyRequests, &[]), 429)
    }

    /// The built-in 500 problem produced by an open circuit breaker.
    #[must_use]
    pub fn circuit_broken() -> Self {
        Self::new("CIRCUIT_BROKEN", i18n::message(MessageId::CircuitBroken, &[]), 500)
    }

    /// A 500 internal problem.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL", message, 500)
    }

    /// Attaches a nested cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Problem) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Overrides the status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Overrides the code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// The effective HTTP status: the recorded status when valid, else 500.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether this problem counts as a downstream failure for the circuit
    /// breaker: status 500 and above.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status >= 500 || self.status == 0
    }
}

impl From<anyhow::Error> for Problem {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_codes_and_statuses() {
        let rl = Problem::rate_limited();
        assert_eq!(rl.code, "RATE_LIMITED");
        assert_eq!(rl.status, 429);

        let cb = Problem::circuit_broken();
        assert_eq!(cb.code, "CIRCUIT_BROKEN");
        assert_eq!(cb.status, 500);
    }

    #[test]
    fn invalid_field_names_the_field_in_the_code() {
        let p = Problem::invalid_field("pw", "field pw is required");
        assert_eq!(p.code, "INVALID_PW");
        assert_eq!(p.status, 400);
    }

    #[test]
    fn unset_status_maps_to_500() {
        let p = Problem::new("X", "y", 0);
        assert_eq!(p.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(p.is_server_error());
    }

    #[test]
    fn cause_chain_serializes() {
        let p = Problem::internal("outer").with_cause(Problem::bad_request("inner"));
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"cause\""));
        assert!(json.contains("inner"));

        let back: Problem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn cause_absent_is_omitted() {
        let json = serde_json::to_string(&Problem::not_found("gone")).unwrap();
        assert!(!json.contains("cause"));
    }

    #[test]
    fn client_errors_are_not_breaker_failures() {
        assert!(!Problem::bad_request("x").is_server_error());
        assert!(!Problem::rate_limited().is_server_error());
        assert!(Problem::circuit_broken().is_server_error());
    }
}
