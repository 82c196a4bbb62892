//! The codec trait and per-application registry.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use trellis_core::{ContentTypeParams, MediaType, Problem};

use crate::error::CodecError;
use crate::json::JsonCodec;
use crate::multipart::MultipartCodec;
use trellis_bind::AnyRecord;

/// A media-type codec: encodes output records and structured errors, and
/// decodes request bodies into input records.
///
/// Decoding is async because multipart bodies stream part by part; the
/// built-in JSON codec completes immediately.
pub trait Codec: Send + Sync + 'static {
    /// The media type this codec handles.
    fn media_type(&self) -> MediaType;

    /// Encodes an output record into a response body.
    fn encode(&self, model: &dyn AnyRecord) -> Result<Vec<u8>, CodecError>;

    /// Encodes a structured error into a response body.
    fn encode_error(&self, problem: &Problem) -> Result<Vec<u8>, CodecError>;

    /// Decodes a request body into the record. An empty body is a no-op.
    fn decode<'a>(
        &'a self,
        body: Bytes,
        params: &'a ContentTypeParams,
        model: &'a mut dyn AnyRecord,
    ) -> BoxFuture<'a, Result<(), CodecError>>;
}

/// Per-application codec table.
///
/// The registry is populated during application build and frozen before the
/// listener starts; the serving path only reads it. Registration is
/// restricted to the recognized [`MediaType`]s by construction.
#[derive(Clone)]
pub struct CodecRegistry {
    map: HashMap<MediaType, Arc<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("media_types", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut map: HashMap<MediaType, Arc<dyn Codec>> = HashMap::new();
        map.insert(MediaType::Json, Arc::new(JsonCodec));
        map.insert(MediaType::MultipartForm, Arc::new(MultipartCodec::new()));
        Self { map }
    }
}

impl CodecRegistry {
    /// Creates a registry with the built-in JSON and multipart codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a codec for a recognized media type.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.map.insert(codec.media_type(), codec);
    }

    /// The codec registered for a media type, if any.
    #[must_use]
    pub fn get(&self, media: MediaType) -> Option<&Arc<dyn Codec>> {
        self.map.get(&media)
    }

    /// The serializer for a negotiated `Accept` type. Unregistered types
    /// fall back to JSON.
    #[must_use]
    pub fn serializer(&self, accept: MediaType) -> Arc<dyn Codec> {
        self.map
            .get(&accept)
            .or_else(|| self.map.get(&MediaType::Json))
            .cloned()
            .expect("JSON codec is always registered")
    }

    /// The deserializer for a request `Content-Type`. Unregistered types
    /// fall back to JSON.
    #[must_use]
    pub fn deserializer(&self, content: MediaType) -> Arc<dyn Codec> {
        self.serializer(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = CodecRegistry::new();
        assert!(registry.get(MediaType::Json).is_some());
        assert!(registry.get(MediaType::MultipartForm).is_some());
        assert!(registry.get(MediaType::Pdf).is_none());
    }

    #[test]
    fn unregistered_accept_falls_back_to_json() {
        let registry = CodecRegistry::new();
        let codec = registry.serializer(MediaType::Pdf);
        assert_eq!(codec.media_type(), MediaType::Json);
    }

    #[test]
    fn registered_type_is_selected() {
        let registry = CodecRegistry::new();
        let codec = registry.serializer(MediaType::MultipartForm);
        assert_eq!(codec.media_type(), MediaType::MultipartForm);
    }
}
