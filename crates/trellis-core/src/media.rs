//! Recognized media types and header parsing.
//!
//! Trellis recognizes a fixed set of media types; serializer registration is
//! restricted to this set. `Accept` and `Content-Type` negotiation both fall
//! back to JSON for unknown or wildcard values.

use std::collections::HashMap;
use std::fmt;

/// Parameters attached to a `Content-Type` header, e.g. the multipart
/// `boundary`.
pub type ContentTypeParams = HashMap<String, String>;

/// The media types Trellis recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// `application/json` (the default).
    Json,
    /// `multipart/form-data`.
    MultipartForm,
    /// `x-www-form-encoded`.
    UrlencodedForm,
    /// `text/plain`.
    Text,
    /// `text/html`.
    Html,
    /// `application/pdf`.
    Pdf,
}

impl MediaType {
    /// All recognized media types.
    pub const ALL: [MediaType; 6] = [
        MediaType::Json,
        MediaType::MultipartForm,
        MediaType::UrlencodedForm,
        MediaType::Text,
        MediaType::Html,
        MediaType::Pdf,
    ];

    /// The canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::MultipartForm => "multipart/form-data",
            MediaType::UrlencodedForm => "x-www-form-encoded",
            MediaType::Text => "text/plain",
            MediaType::Html => "text/html",
            MediaType::Pdf => "application/pdf",
        }
    }

    /// Parses a media-type essence (no parameters). Returns `None` for
    /// unrecognized types.
    #[must_use]
    pub fn parse(essence: &str) -> Option<Self> {
        match essence.trim().to_ascii_lowercase().as_str() {
            "application/json" => Some(MediaType::Json),
            "multipart/form-data" => Some(MediaType::MultipartForm),
            "x-www-form-encoded" => Some(MediaType::UrlencodedForm),
            "text/plain" => Some(MediaType::Text),
            "text/html" => Some(MediaType::Html),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Negotiates the response media type from an `Accept` header value.
    ///
    /// Missing, malformed, unrecognized, and `*/*` values all resolve to
    /// JSON.
    #[must_use]
    pub fn from_accept(header: Option<&str>) -> Self {
        let Some(raw) = header else {
            return MediaType::Json;
        };
        let (essence, _) = split_media_type(raw);
        if essence == "*/*" {
            return MediaType::Json;
        }
        MediaType::parse(&essence).unwrap_or(MediaType::Json)
    }

    /// Parses a `Content-Type` header into a media type and its parameters.
    ///
    /// Missing or unrecognized types resolve to JSON with no parameters.
    #[must_use]
    pub fn from_content_type(header: Option<&str>) -> (Self, ContentTypeParams) {
        let Some(raw) = header else {
            return (MediaType::Json, ContentTypeParams::new());
        };
        let (essence, params) = split_media_type(raw);
        let media = MediaType::parse(&essence).unwrap_or(MediaType::Json);
        (media, params)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a media-type header into its lowercased essence and parameters.
fn split_media_type(raw: &str) -> (String, ContentTypeParams) {
    let mut parts = raw.split(';');
    let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let mut params = ContentTypeParams::new();
    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            params.insert(key.trim().to_ascii_lowercase(), value.to_string());
        }
    }
    (essence, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_defaults_to_json() {
        assert_eq!(MediaType::from_accept(None), MediaType::Json);
        assert_eq!(MediaType::from_accept(Some("*/*")), MediaType::Json);
        assert_eq!(MediaType::from_accept(Some("application/x-unknown")), MediaType::Json);
    }

    #[test]
    fn accept_recognizes_known_types() {
        assert_eq!(MediaType::from_accept(Some("text/html")), MediaType::Html);
        assert_eq!(
            MediaType::from_accept(Some("multipart/form-data; boundary=x")),
            MediaType::MultipartForm
        );
    }

    #[test]
    fn content_type_extracts_boundary() {
        let (media, params) = MediaType::from_content_type(Some(
            "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW",
        ));
        assert_eq!(media, MediaType::MultipartForm);
        assert_eq!(
            params.get("boundary").map(String::as_str),
            Some("----WebKitFormBoundary7MA4YWxkTrZu0gW")
        );
    }

    #[test]
    fn content_type_strips_quotes_and_case() {
        let (media, params) =
            MediaType::from_content_type(Some("Application/JSON; Charset=\"UTF-8\""));
        assert_eq!(media, MediaType::Json);
        assert_eq!(params.get("charset").map(String::as_str), Some("UTF-8"));
    }

    #[test]
    fn parse_round_trips_all() {
        for media in MediaType::ALL {
            assert_eq!(MediaType::parse(media.as_str()), Some(media));
        }
    }
}
