//! Codec errors.

use trellis_bind::RecordError;
use trellis_core::Problem;

/// Errors raised while encoding or decoding a request/response body.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Encoding the response body failed.
    #[error("failed to encode body: {0}")]
    Encode(String),

    /// Decoding the request body failed.
    #[error("failed to decode body: {0}")]
    Decode(String),

    /// A multipart body arrived without a boundary parameter.
    #[error("form data boundary is not specified")]
    MissingBoundary,

    /// A decoded part could not be applied to the record.
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl CodecError {
    /// Whether the failure is the client's fault (a decode-side problem).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            CodecError::Encode(_) | CodecError::Record(RecordError::Serialize(_))
        )
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Decode(err.to_string())
    }
}

impl From<CodecError> for Problem {
    fn from(err: CodecError) -> Self {
        if err.is_client_error() {
            Problem::bad_request(err.to_string())
        } else {
            Problem::internal(err.to_string())
        }
    }
}
