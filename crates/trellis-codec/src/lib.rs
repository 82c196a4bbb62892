//! # Trellis Codec
//!
//! Content-type codecs and the per-application serializer registry.
//!
//! A [`Codec`] pairs an encoder (output record or structured error → body)
//! with a decoder (body → input record) for one recognized media type.
//! Codecs see records through the erased [`AnyRecord`] view that every
//! derived `Record` provides. The [`CodecRegistry`] is populated at
//! application build time and frozen before the listener starts;
//! `Accept`/`Content-Type` negotiation falls back to JSON for unknown or
//! wildcard values.
//!
//! Built-ins: [`JsonCodec`] (serde round-trip) and [`MultipartCodec`]
//! (multer-backed decode, hand-rolled encode).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
mod error;
mod json;
mod multipart;

pub use codec::{Codec, CodecRegistry};
pub use error::CodecError;
pub use json::JsonCodec;
pub use multipart::{MultipartCodec, MAX_BODY_SIZE};

pub use trellis_bind::{AnyRecord, FormField, RecordError};
pub use trellis_core::{ContentTypeParams, MediaType};
