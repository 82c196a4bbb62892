//! The input binder.
//!
//! Populates a typed input record from the request: defaults first, then
//! the field's declared source (path parameter, query parameter, header,
//! cookie — first non-empty wins, overriding the default), optional
//! decryption, and the common string coercion. The negotiated deserializer
//! runs on the body last, so body keys override source-bound fields.

use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::i18n::{self, MessageId};
use trellis_core::{Context, Problem};

use crate::record::{Record, Source};

/// A registered payload decrypter.
pub type Decrypter = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, anyhow::Error> + Send + Sync>;

/// Per-application decrypter table, consulted by `decrypt` tags.
///
/// Populated during application build; read-only while serving.
#[derive(Clone, Default)]
pub struct DecrypterRegistry {
    map: HashMap<String, Decrypter>,
}

impl DecrypterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decrypter under an algorithm name.
    pub fn register(&mut self, name: impl Into<String>, decrypter: Decrypter) {
        self.map.insert(name.into(), decrypter);
    }

    /// Looks up a decrypter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Decrypter> {
        self.map.get(name)
    }
}

impl std::fmt::Debug for DecrypterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecrypterRegistry")
            .field("algorithms", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Binds the non-body fields of a record from the request context:
/// defaults when zero, then the declared source, optional decryption, and
/// the common string coercion. The caller runs the negotiated deserializer
/// on the body afterwards, so body keys override source-bound fields.
///
/// # Errors
///
/// Coercion failures surface as 400 problems naming the field.
pub fn bind_non_body<T: Record>(
    record: &mut T,
    ctx: &Context,
    decrypters: &DecrypterRegistry,
) -> Result<(), Problem> {
    let mut query: Option<HashMap<String, String>> = None;
    let mut cookies: Option<HashMap<String, String>> = None;

    for spec in T::FIELDS {
        if spec.nested.is_some() {
            continue;
        }

        let sourced: Option<String> = match spec.source {
            Source::None => None,
            Source::Path(key) => ctx.path_params().get(key).map(str::to_string),
            Source::Query(key) => {
                let map = query.get_or_insert_with(|| parse_query(ctx.uri().query()));
                map.get(key).cloned()
            }
            Source::Header(key) => ctx
                .headers()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            Source::Cookie(key) => {
                let map = cookies.get_or_insert_with(|| parse_cookies(ctx.headers()));
                map.get(key).cloned()
            }
        };

        let chosen = match sourced {
            Some(value) if !value.is_empty() => Some(value),
            _ => match spec.default {
                Some(default) if (spec.get)(record).is_zero() => Some(default.to_string()),
                _ => None,
            },
        };

        let Some(mut value) = chosen else {
            continue;
        };

        if let Some(alg) = spec.decrypt {
            if let Some(decrypter) = decrypters.get(alg) {
                match decrypter(value.as_bytes()) {
                    Ok(plain) => match String::from_utf8(plain) {
                        Ok(plain) => value = plain,
                        Err(_) => tracing::warn!(
                            field = spec.name,
                            alg,
                            "decrypted value is not UTF-8; keeping original"
                        ),
                    },
                    // Failure keeps the original string.
                    Err(err) => {
                        tracing::warn!(field = spec.name, alg, error = %err, "failed to decrypt field");
                    }
                }
            }
        }

        (spec.set)(record, &value).map_err(|_| {
            Problem::invalid_field(
                spec.name,
                i18n::message(MessageId::BindCoercion, &[spec.name, &value]),
            )
        })?;
    }
    Ok(())
}

/// Parses a query string into a map, first value per key, percent-decoded.
fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Some(query) = query else {
        return map;
    };
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key);
        map.entry(key).or_insert_with(|| percent_decode(value));
    }
    map
}

/// Parses the `Cookie` header into a name → value map.
fn parse_cookies(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for header in headers.get_all(http::header::COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                map.entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    map
}

/// Decodes `%XX` escapes and `+` as space.
fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing_decodes_and_keeps_first() {
        let map = parse_query(Some("a=1&b=hello%20world&a=2&c=x+y&flag"));
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("hello world"));
        assert_eq!(map.get("c").map(String::as_str), Some("x y"));
        assert_eq!(map.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn cookie_parsing() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::COOKIE,
            http::HeaderValue::from_static("session=abc123; theme=dark"),
        );
        let map = parse_cookies(&headers);
        assert_eq!(map.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(map.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn percent_decode_malformed_passthrough() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%ZZb"), "a%ZZb");
        assert_eq!(percent_decode("%41"), "A");
    }
}
