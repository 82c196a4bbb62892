//! Field value views and string coercion.
//!
//! Every bindable field type implements two small traits: [`FromFieldStr`]
//! (the common value-from-string coercion used by the binder and the
//! multipart decoder) and [`AsFieldValue`] (a typed view the validators
//! inspect without knowing the concrete record type).

use bytes::Bytes;

/// Coercion failure: the raw string did not parse into the field's type.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("cannot parse '{value}' as {ty}")]
pub struct ValueError {
    /// The raw input.
    pub value: String,
    /// The target type name.
    pub ty: &'static str,
}

impl ValueError {
    fn new(value: &str, ty: &'static str) -> Self {
        Self {
            value: value.to_string(),
            ty,
        }
    }
}

/// A typed view of a field's current value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// String kinds.
    Str(&'a str),
    /// String slices.
    StrList(&'a [String]),
    /// Signed integer kinds.
    Int(i64),
    /// Unsigned integer kinds.
    Uint(u64),
    /// Floating-point kinds.
    Float(f64),
    /// Booleans.
    Bool(bool),
    /// Byte slices (file fields).
    Bytes(&'a [u8]),
    /// Kinds validators cannot inspect (e.g. nested records).
    Opaque,
}

impl FieldValue<'_> {
    /// Whether the value is its type's zero. Zero fields are treated as
    /// "unset" by default-application and by range/length validators.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::StrList(l) => l.is_empty(),
            FieldValue::Int(v) => *v == 0,
            FieldValue::Uint(v) => *v == 0,
            FieldValue::Float(v) => *v == 0.0,
            FieldValue::Bool(v) => !v,
            FieldValue::Bytes(b) => b.is_empty(),
            FieldValue::Opaque => true,
        }
    }

    /// The value as a float, for range checks.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Uint(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string, for length and email checks.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as form text, for multipart encoding.
    #[must_use]
    pub fn to_form_text(&self) -> String {
        match self {
            FieldValue::Str(s) => (*s).to_string(),
            FieldValue::StrList(l) => l.join(","),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Uint(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Bool(v) => v.to_string(),
            FieldValue::Bytes(_) | FieldValue::Opaque => String::new(),
        }
    }
}

/// The common value-from-string coercion.
pub trait FromFieldStr: Sized {
    /// Parses the raw string into the field type.
    fn from_field_str(raw: &str) -> Result<Self, ValueError>;
}

macro_rules! impl_from_field_str {
    ($($ty:ty),*) => {
        $(
            impl FromFieldStr for $ty {
                fn from_field_str(raw: &str) -> Result<Self, ValueError> {
                    raw.trim()
                        .parse::<$ty>()
                        .map_err(|_| ValueError::new(raw, stringify!($ty)))
                }
            }
        )*
    };
}

impl_from_field_str!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl FromFieldStr for bool {
    fn from_field_str(raw: &str) -> Result<Self, ValueError> {
        match raw.trim() {
            "true" | "TRUE" | "True" | "1" | "t" | "T" => Ok(true),
            "false" | "FALSE" | "False" | "0" | "f" | "F" => Ok(false),
            _ => Err(ValueError::new(raw, "bool")),
        }
    }
}

impl FromFieldStr for String {
    fn from_field_str(raw: &str) -> Result<Self, ValueError> {
        Ok(raw.to_string())
    }
}

impl<T: FromFieldStr> FromFieldStr for Vec<T> {
    fn from_field_str(raw: &str) -> Result<Self, ValueError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(T::from_field_str).collect()
    }
}

impl<T: FromFieldStr> FromFieldStr for Option<T> {
    fn from_field_str(raw: &str) -> Result<Self, ValueError> {
        T::from_field_str(raw).map(Some)
    }
}

/// The typed view used by validators.
pub trait AsFieldValue {
    /// Returns the value view.
    fn as_field_value(&self) -> FieldValue<'_>;
}

macro_rules! impl_as_int {
    ($($ty:ty),*) => {
        $(
            impl AsFieldValue for $ty {
                fn as_field_value(&self) -> FieldValue<'_> {
                    FieldValue::Int(*self as i64)
                }
            }
        )*
    };
}

macro_rules! impl_as_uint {
    ($($ty:ty),*) => {
        $(
            impl AsFieldValue for $ty {
                fn as_field_value(&self) -> FieldValue<'_> {
                    FieldValue::Uint(*self as u64)
                }
            }
        )*
    };
}

impl_as_int!(i8, i16, i32, i64, isize);
impl_as_uint!(u16, u32, u64, usize);

impl AsFieldValue for f32 {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(f64::from(*self))
    }
}

impl AsFieldValue for f64 {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(*self)
    }
}

impl AsFieldValue for bool {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Bool(*self)
    }
}

impl AsFieldValue for String {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Str(self)
    }
}

impl AsFieldValue for Vec<String> {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::StrList(self)
    }
}

impl AsFieldValue for Vec<u8> {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Bytes(self)
    }
}

impl AsFieldValue for u8 {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Uint(u64::from(*self))
    }
}

impl AsFieldValue for Bytes {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Bytes(self)
    }
}

impl<T: AsFieldValue> AsFieldValue for Option<T> {
    fn as_field_value(&self) -> FieldValue<'_> {
        match self {
            Some(v) => v.as_field_value(),
            None => FieldValue::Opaque,
        }
    }
}

/// Byte-slice fields that can hold a decoded multipart file part.
pub trait FromFileBytes {
    /// Builds the field value from the part's content.
    fn from_file_bytes(content: Bytes) -> Self;
}

impl FromFileBytes for Vec<u8> {
    fn from_file_bytes(content: Bytes) -> Self {
        content.to_vec()
    }
}

impl FromFileBytes for Bytes {
    fn from_file_bytes(content: Bytes) -> Self {
        content
    }
}
