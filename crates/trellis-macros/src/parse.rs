//! Attribute parsing for `#[derive(Record)]`.

use syn::{Attribute, Field, LitStr, Result};

/// The parsed `#[record(...)]` attributes of one field.
#[derive(Default)]
pub struct FieldAttrs {
    pub path: Option<String>,
    pub query: Option<String>,
    pub header: Option<String>,
    pub cookie: Option<String>,
    pub default: Option<String>,
    pub decrypt: Option<String>,
    pub validate: Option<String>,
    pub file: Option<String>,
    pub nested: bool,
}

impl FieldAttrs {
    /// Parses the `record` attributes of a field.
    pub fn parse(field: &Field) -> Result<Self> {
        let mut attrs = FieldAttrs::default();
        for attr in &field.attrs {
            if attr.path().is_ident("record") {
                attrs.parse_attr(attr)?;
            }
        }
        attrs.check(field)?;
        Ok(attrs)
    }

    fn parse_attr(&mut self, attr: &Attribute) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                self.nested = true;
                return Ok(());
            }
            let value: LitStr = meta.value()?.parse()?;
            let value = value.value();
            if meta.path.is_ident("path") {
                self.path = Some(value);
            } else if meta.path.is_ident("query") {
                self.query = Some(value);
            } else if meta.path.is_ident("header") {
                self.header = Some(value);
            } else if meta.path.is_ident("cookie") {
                self.cookie = Some(value);
            } else if meta.path.is_ident("default") {
                self.default = Some(value);
            } else if meta.path.is_ident("decrypt") {
                self.decrypt = Some(value);
            } else if meta.path.is_ident("validate") {
                self.validate = Some(value);
            } else if meta.path.is_ident("file") {
                self.file = Some(value);
            } else {
                return Err(meta.error(
                    "unknown record attribute; expected one of \
                     path, query, header, cookie, default, decrypt, validate, file, nested",
                ));
            }
            Ok(())
        })
    }

    fn check(&self, field: &Field) -> Result<()> {
        let sources = [&self.path, &self.query, &self.header, &self.cookie]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if sources > 1 {
            return Err(syn::Error::new_spanned(
                field,
                "a field may declare at most one of path, query, header, cookie",
            ));
        }
        if self.nested && (sources > 0 || self.default.is_some() || self.file.is_some()) {
            return Err(syn::Error::new_spanned(
                field,
                "a nested field only supports the validate attribute",
            ));
        }
        Ok(())
    }
}
