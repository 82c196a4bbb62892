//! Multipart form codec.
//!
//! Decoding is backed by `multer` with the boundary taken from the
//! `Content-Type` parameters: scalar parts populate fields by name, file
//! parts land in byte-slice fields, and parts naming unknown fields are
//! silently ignored. Encoding writes text fields by field name and
//! `file`-tagged fields as form files.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use trellis_core::{ContentTypeParams, MediaType, Problem};
use uuid::Uuid;

use crate::codec::Codec;
use crate::error::CodecError;
use trellis_bind::{AnyRecord, FormField, RecordError};

/// Maximum accepted multipart body size (50 MB).
pub const MAX_BODY_SIZE: usize = 50 * 1024 * 1024;

/// The built-in `multipart/form-data` codec.
#[derive(Debug, Clone)]
pub struct MultipartCodec {
    max_body_size: usize,
}

impl Default for MultipartCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartCodec {
    /// Creates the codec with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_body_size: MAX_BODY_SIZE,
        }
    }

    /// Overrides the maximum accepted body size.
    #[must_use]
    pub fn with_max_body_size(mut self, max: usize) -> Self {
        self.max_body_size = max;
        self
    }
}

/// Incremental writer for a multipart body.
struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartWriter {
    fn new() -> Self {
        Self {
            boundary: format!("trellis-{}", Uuid::now_v7().simple()),
            buf: Vec::new(),
        }
    }

    fn write_text(&mut self, name: &str, value: &str) {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    fn write_file(&mut self, name: &str, filename: &str, content: &[u8]) {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }
}

impl Codec for MultipartCodec {
    fn media_type(&self) -> MediaType {
        MediaType::MultipartForm
    }

    fn encode(&self, model: &dyn AnyRecord) -> Result<Vec<u8>, CodecError> {
        let mut writer = MultipartWriter::new();
        for field in model.form_fields() {
            match field {
                FormField::Text { name, value } => writer.write_text(name, &value),
                FormField::File {
                    name,
                    filename,
                    content,
                } => writer.write_file(name, filename, &content),
            }
        }
        Ok(writer.finish())
    }

    fn encode_error(&self, problem: &Problem) -> Result<Vec<u8>, CodecError> {
        let mut writer = MultipartWriter::new();
        if !problem.code.is_empty() {
            writer.write_text("code", &problem.code);
        }
        if !problem.message.is_empty() {
            writer.write_text("message", &problem.message);
        }
        if problem.status > 0 {
            writer.write_text("status", &problem.status.to_string());
        }
        if let Some(cause) = &problem.cause {
            writer.write_text("cause", &cause.to_string());
        }
        Ok(writer.finish())
    }

    fn decode<'a>(
        &'a self,
        body: Bytes,
        params: &'a ContentTypeParams,
        model: &'a mut dyn AnyRecord,
    ) -> BoxFuture<'a, Result<(), CodecError>> {
        Box::pin(async move {
            if body.is_empty() {
                return Ok(());
            }
            if body.len() > self.max_body_size {
                return Err(CodecError::Decode(format!(
                    "multipart body exceeds {} bytes",
                    self.max_body_size
                )));
            }
            let boundary = params
                .get("boundary")
                .ok_or(CodecError::MissingBoundary)?
                .clone();

            let stream = futures_util::stream::once(async move {
                Ok::<Bytes, std::convert::Infallible>(body)
            });
            let mut multipart = multer::Multipart::new(stream, boundary);

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| CodecError::Decode(e.to_string()))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let is_file = field.file_name().is_some();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CodecError::Decode(e.to_string()))?;

                let outcome = if is_file {
                    model.set_file(&name, data)
                } else {
                    let text = std::str::from_utf8(&data)
                        .map_err(|_| CodecError::Decode(format!("field '{name}' is not UTF-8")))?;
                    model.set_text(&name, text)
                };
                match outcome {
                    Ok(()) => {}
                    // Unknown fields are ignored.
                    Err(RecordError::UnknownField(_)) => {}
                    Err(e) => return Err(CodecError::Record(e)),
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use trellis_bind::{AsFieldValue, FieldSpec, FromFileBytes, Record, Source};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Upload {
        title: String,
        data: Vec<u8>,
    }

    impl Record for Upload {
        const FIELDS: &'static [FieldSpec<Self>] = &[
            FieldSpec {
                name: "title",
                source: Source::None,
                default: None,
                decrypt: None,
                validate: "",
                file: None,
                set: |r, s| {
                    r.title = s.to_string();
                    Ok(())
                },
                get: |r| r.title.as_field_value(),
                set_bytes: None,
                nested: None,
            },
            FieldSpec {
                name: "data",
                source: Source::None,
                default: None,
                decrypt: None,
                validate: "",
                file: Some("data.bin"),
                set: |_, s| {
                    Err(trellis_bind::ValueError {
                        value: s.to_string(),
                        ty: "file field",
                    })
                },
                get: |r| r.data.as_field_value(),
                set_bytes: Some(|r, b| r.data = FromFileBytes::from_file_bytes(b)),
                nested: None,
            },
        ];
    }

    fn body_with_boundary(boundary: &str) -> Bytes {
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             hello\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"data\"; filename=\"d.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \x01\x02\x03\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"extra\"\r\n\r\n\
             ignored\r\n\
             --{boundary}--\r\n"
        );
        Bytes::from(body)
    }

    fn params(boundary: &str) -> ContentTypeParams {
        let mut p = HashMap::new();
        p.insert("boundary".to_string(), boundary.to_string());
        p
    }

    #[tokio::test]
    async fn decodes_scalars_files_and_ignores_unknown() {
        let mut model = Upload::default();
        MultipartCodec::new()
            .decode(body_with_boundary("XX"), &params("XX"), &mut model)
            .await
            .unwrap();
        assert_eq!(model.title, "hello");
        assert_eq!(model.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_boundary_is_an_error() {
        let mut model = Upload::default();
        let err = MultipartCodec::new()
            .decode(body_with_boundary("XX"), &HashMap::new(), &mut model)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingBoundary));
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let mut model = Upload::default();
        let err = MultipartCodec::new()
            .with_max_body_size(8)
            .decode(body_with_boundary("XX"), &params("XX"), &mut model)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[tokio::test]
    async fn encode_decode_round_trip() {
        let original = Upload {
            title: "report".into(),
            data: vec![9, 8, 7],
        };
        let encoded = MultipartCodec::new().encode(&original).unwrap();
        let text = String::from_utf8_lossy(&encoded);
        let boundary = text
            .lines()
            .next()
            .unwrap()
            .trim_start_matches('-')
            .to_string();

        let mut decoded = Upload::default();
        MultipartCodec::new()
            .decode(Bytes::from(encoded.clone()), &params(&boundary), &mut decoded)
            .await
            .unwrap();
        assert_eq!(decoded.title, "report");
        assert_eq!(decoded.data, vec![9, 8, 7]);
    }

    #[test]
    fn error_bodies_carry_code_and_status() {
        let body = MultipartCodec::new()
            .encode_error(&Problem::circuit_broken())
            .unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("CIRCUIT_BROKEN"));
        assert!(text.contains("500"));
    }
}
