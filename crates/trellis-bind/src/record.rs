//! The `Record` trait and compiled field descriptors.
//!
//! Deriving `Record` compiles a struct's field attributes into a static
//! descriptor table walked by the binder, the validators, and the codecs —
//! no runtime reflection. The descriptor carries the field's binding
//! source, default, decryption algorithm, validation fragments, and typed
//! setter/getter function pointers.
//!
//! Codecs see records through the object-safe [`AnyRecord`] view, which
//! every `Record` implements.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use trellis_core::Problem;

use crate::validate::BuildError;
use crate::value::{FieldValue, ValueError};

/// Where a field's non-body value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Body-only field.
    None,
    /// A captured path parameter.
    Path(&'static str),
    /// A query-string parameter.
    Query(&'static str),
    /// A request header.
    Header(&'static str),
    /// A request cookie.
    Cookie(&'static str),
}

/// A compiled nested-validator factory: builds the sub-validator for a
/// nested record field at mount time.
pub type NestedCompile<T> =
    fn() -> Result<Box<dyn Fn(&T) -> Result<(), Problem> + Send + Sync>, BuildError>;

/// One field's compiled descriptor.
pub struct FieldSpec<T> {
    /// The field identifier.
    pub name: &'static str,
    /// Non-body binding source.
    pub source: Source,
    /// `default` tag: adopted when the field is zero.
    pub default: Option<&'static str>,
    /// `decrypt` tag: registered decrypter name.
    pub decrypt: Option<&'static str>,
    /// `validate` tag: semicolon-separated fragments.
    pub validate: &'static str,
    /// `file` tag: the filename used when multipart-encoding this field.
    pub file: Option<&'static str>,
    /// Coerces a raw string into the field.
    pub set: fn(&mut T, &str) -> Result<(), ValueError>,
    /// Returns the typed view of the field's current value.
    pub get: fn(&T) -> FieldValue<'_>,
    /// Accepts a decoded file part, for byte-slice fields.
    pub set_bytes: Option<fn(&mut T, Bytes)>,
    /// Builds the nested sub-validator, for nested record fields.
    pub nested: Option<NestedCompile<T>>,
}

/// A typed input or output record.
///
/// Implemented via `#[derive(Record)]`; the derive only accepts structs
/// with named fields, which enforces the input-must-be-a-struct mount
/// invariant at compile time.
pub trait Record: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The compiled field descriptor table.
    const FIELDS: &'static [FieldSpec<Self>];

    /// True for the sentinel empty output that renders as 204 No Content.
    const EMPTY_OUTPUT: bool = false;

    /// Finds a field descriptor by name.
    #[must_use]
    fn field(name: &str) -> Option<&'static FieldSpec<Self>> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}

/// The sentinel output record for endpoints with nothing to return; the
/// pipeline renders it as `204 No Content`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct NoContent;

impl Record for NoContent {
    const FIELDS: &'static [FieldSpec<Self>] = &[];
    const EMPTY_OUTPUT: bool = true;
}

/// A single field as the multipart encoder sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    /// A scalar field rendered as text.
    Text {
        /// Field name.
        name: &'static str,
        /// Rendered value.
        value: String,
    },
    /// A `file`-tagged field rendered as a form file.
    File {
        /// Field name.
        name: &'static str,
        /// The filename from the `file` tag.
        filename: &'static str,
        /// File content.
        content: Bytes,
    },
}

/// Failures surfaced through the erased record view.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Serializing the record failed.
    #[error("failed to serialize record: {0}")]
    Serialize(String),

    /// Deserializing into the record failed.
    #[error("failed to deserialize record: {0}")]
    Deserialize(String),

    /// A decoded part named a field the record does not have.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A file part targeted a field that cannot hold bytes.
    #[error("field '{field}' cannot accept a file part")]
    NotAFileField {
        /// The targeted field.
        field: String,
    },

    /// A decoded value could not be coerced into its field.
    #[error("invalid value for field '{field}': {reason}")]
    FieldValue {
        /// The targeted field.
        field: String,
        /// Coercion diagnostic.
        reason: String,
    },
}

/// Object-safe view of a record for codecs.
pub trait AnyRecord: Send {
    /// Renders the record as a JSON value.
    fn to_json(&self) -> Result<serde_json::Value, RecordError>;

    /// Merges a decoded JSON body into the record. Keys present in the body
    /// override the current field values; absent keys keep them.
    fn merge_json(&mut self, body: serde_json::Value) -> Result<(), RecordError>;

    /// The record's fields as form parts, for multipart encoding.
    fn form_fields(&self) -> Vec<FormField>;

    /// Sets a scalar field from its text form.
    fn set_text(&mut self, name: &str, value: &str) -> Result<(), RecordError>;

    /// Sets a byte-slice field from a file part.
    fn set_file(&mut self, name: &str, content: Bytes) -> Result<(), RecordError>;
}

/// Deep-merges `overlay` into `base`: object keys present in the overlay
/// override, objects merge recursively, everything else replaces.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl<T: Record> AnyRecord for T {
    fn to_json(&self) -> Result<serde_json::Value, RecordError> {
        serde_json::to_value(self).map_err(|e| RecordError::Serialize(e.to_string()))
    }

    fn merge_json(&mut self, body: serde_json::Value) -> Result<(), RecordError> {
        let mut base =
            serde_json::to_value(&*self).map_err(|e| RecordError::Serialize(e.to_string()))?;
        merge_values(&mut base, body);
        *self =
            serde_json::from_value(base).map_err(|e| RecordError::Deserialize(e.to_string()))?;
        Ok(())
    }

    fn form_fields(&self) -> Vec<FormField> {
        Self::FIELDS
            .iter()
            .map(|spec| match spec.file {
                Some(filename) => {
                    let content = match (spec.get)(self) {
                        FieldValue::Bytes(b) => Bytes::copy_from_slice(b),
                        other => Bytes::from(other.to_form_text().into_bytes()),
                    };
                    FormField::File {
                        name: spec.name,
                        filename,
                        content,
                    }
                }
                None => FormField::Text {
                    name: spec.name,
                    value: (spec.get)(self).to_form_text(),
                },
            })
            .collect()
    }

    fn set_text(&mut self, name: &str, value: &str) -> Result<(), RecordError> {
        let spec = Self::field(name).ok_or_else(|| RecordError::UnknownField(name.to_string()))?;
        (spec.set)(self, value).map_err(|e| RecordError::FieldValue {
            field: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn set_file(&mut self, name: &str, content: Bytes) -> Result<(), RecordError> {
        let spec = Self::field(name).ok_or_else(|| RecordError::UnknownField(name.to_string()))?;
        let set_bytes = spec.set_bytes.ok_or_else(|| RecordError::NotAFileField {
            field: name.to_string(),
        })?;
        set_bytes(self, content);
        Ok(())
    }
}
