//! Procedural macros for Trellis.
//!
//! Provides `#[derive(Record)]`, which compiles a struct's `#[record(...)]`
//! field attributes into the static descriptor table the binder, the
//! validator compiler and the multipart codec walk at request time.
//!
//! # Attributes
//!
//! | Attribute | Effect |
//! |---|---|
//! | `path = "k"` | bind from the captured path parameter `k` |
//! | `query = "k"` | bind from the query parameter `k` |
//! | `header = "k"` | bind from the request header `k` |
//! | `cookie = "k"` | bind from the request cookie `k` |
//! | `default = "v"` | adopt `v` when the field is zero |
//! | `decrypt = "alg"` | decrypt the bound string with the registered algorithm |
//! | `validate = "f;f"` | semicolon-separated validation fragments |
//! | `file = "name"` | multipart: encode as a form file, decode file parts |
//! | `nested` | recurse validation into a nested record |
//!
//! # Example
//!
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use trellis_macros::Record;
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Record)]
//! struct CreateUser {
//!     #[record(path = "org")]
//!     org: String,
//!     #[record(validate = "required;email")]
//!     email: String,
//!     #[record(validate = "[1,150]")]
//!     age: i64,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod expand;
mod parse;

/// Derives the `Record` trait, compiling `#[record(...)]` field attributes
/// into a static field descriptor table.
///
/// Only structs with named fields are accepted; deriving on an enum, tuple
/// struct, or unit struct is a compile error — input records must be plain
/// structs.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand::expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
