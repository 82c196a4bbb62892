//! JSON codec: round-trip through `serde_json`.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use trellis_bind::AnyRecord;
use trellis_core::{ContentTypeParams, MediaType, Problem};

use crate::codec::Codec;
use crate::error::CodecError;

/// The built-in `application/json` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn media_type(&self) -> MediaType {
        MediaType::Json
    }

    fn encode(&self, model: &dyn AnyRecord) -> Result<Vec<u8>, CodecError> {
        let value = model.to_json()?;
        serde_json::to_vec(&value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn encode_error(&self, problem: &Problem) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(problem).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<'a>(
        &'a self,
        body: Bytes,
        _params: &'a ContentTypeParams,
        model: &'a mut dyn AnyRecord,
    ) -> BoxFuture<'a, Result<(), CodecError>> {
        Box::pin(async move {
            if body.is_empty() {
                return Ok(());
            }
            let value: serde_json::Value = serde_json::from_slice(&body)?;
            model.merge_json(value)?;
            Ok(())
        })
    }
}
