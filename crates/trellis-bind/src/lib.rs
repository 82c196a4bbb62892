//! # Trellis Bind
//!
//! Typed input binding and declarative validation.
//!
//! A request's input record is populated from compiled field descriptors —
//! no runtime reflection. Deriving [`Record`] on a struct compiles its
//! field attributes (`path`, `query`, `header`, `cookie`, `default`,
//! `decrypt`, `validate`, `file`) into a static table; the binder walks the
//! table at request time, and the validator compiler turns `validate`
//! fragments into per-field closures at mount time.
//!
//! ```ignore
//! use trellis_bind::Record;
//!
//! #[derive(Debug, Default, serde::Serialize, serde::Deserialize, Record)]
//! struct GetUser {
//!     #[record(path = "id")]
//!     id: i64,
//!     #[record(query = "verbose", default = "false")]
//!     verbose: bool,
//!     #[record(header = "x-api-key", validate = "required")]
//!     api_key: String,
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod record;
pub mod validate;
pub mod value;

pub use binder::{bind_non_body, Decrypter, DecrypterRegistry};

// Re-exports used by the generated code of `#[derive(Record)]`.
#[doc(hidden)]
pub use bytes as __bytes;
#[doc(hidden)]
pub use trellis_core as __core;
pub use record::{
    AnyRecord, FieldSpec, FormField, NestedCompile, NoContent, Record, RecordError, Source,
};
pub use validate::{
    compile, compile_builtin, BuildError, CustomValidators, ErasedRule, RuleFactory, Validator,
};
pub use value::{AsFieldValue, FieldValue, FromFieldStr, FromFileBytes, ValueError};
