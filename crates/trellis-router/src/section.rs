//! Section variants.
//!
//! Each node of the routing tree is a *section*: one path segment,
//! specialized by a variant that decides how the segment matches and how
//! ties between overlapping candidates break. Higher weight wins among
//! candidates at the same depth.

use std::sync::OnceLock;

use regex::Regex;

/// Weight of a static section.
pub const WEIGHT_STATIC: u8 = 64;
/// Weight of a typed-format (`%s` / `%d`) section.
pub const WEIGHT_FORMAT: u8 = 56;
/// Weight of a named-regex (`{name:~expr}`) section.
pub const WEIGHT_NAMED_REGEX: u8 = 52;
/// Weight of a regex (`~expr`) section.
pub const WEIGHT_REGEX: u8 = 48;
/// Weight of a named (`{name}`) section.
pub const WEIGHT_NAMED: u8 = 8;
/// Weight of a match-all (`*`) section.
pub const WEIGHT_MATCH_ALL: u8 = 4;

/// The typed-format predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `%s` — any non-empty segment.
    Str,
    /// `%d` — a segment parsable as `i64`.
    Int,
}

impl Format {
    fn accepts(self, part: &str) -> bool {
        match self {
            Format::Str => !part.is_empty(),
            Format::Int => part.parse::<i64>().is_ok(),
        }
    }
}

/// A section variant with its match payload.
#[derive(Debug, Clone)]
pub enum SectionKind {
    /// The synthetic `/` root, level 0.
    Root,
    /// Literal segment.
    Static,
    /// Trailing empty segment; terminates only, never continues.
    EmptyFinal,
    /// `*` — matches any segment.
    MatchAll,
    /// `~<expr>` — full-segment regex match.
    Regex(Regex),
    /// `{name}` — always matches, captures the segment.
    Named(String),
    /// `{name:~<expr>}` — regex match plus capture.
    NamedRegex(String, Regex),
    /// `%s` / `%d` — predicate match.
    Format(Format),
}

impl SectionKind {
    /// The tie-break weight for this variant.
    #[must_use]
    pub fn weight(&self) -> u8 {
        match self {
            SectionKind::Static => WEIGHT_STATIC,
            SectionKind::Format(_) => WEIGHT_FORMAT,
            SectionKind::NamedRegex(..) => WEIGHT_NAMED_REGEX,
            SectionKind::Regex(_) => WEIGHT_REGEX,
            SectionKind::Named(_) => WEIGHT_NAMED,
            SectionKind::MatchAll => WEIGHT_MATCH_ALL,
            SectionKind::Root | SectionKind::EmptyFinal => 0,
        }
    }

    /// Whether this variant accepts `part` as the segment it sits on.
    ///
    /// `pattern` is the raw pattern string of the section, used by the
    /// static variant for literal comparison. This is the shared predicate
    /// behind both final and middle matching; the empty-final restriction
    /// (never continues deeper) is enforced by the caller.
    pub(crate) fn accepts(&self, pattern: &str, part: &str) -> bool {
        match self {
            SectionKind::Root => part.is_empty(),
            SectionKind::Static => part == pattern,
            SectionKind::EmptyFinal => part.is_empty(),
            SectionKind::MatchAll => true,
            SectionKind::Regex(re) => re.is_match(part),
            SectionKind::Named(_) => true,
            SectionKind::NamedRegex(_, re) => re.is_match(part),
            SectionKind::Format(fmt) => fmt.accepts(part),
        }
    }

    /// The capture this variant produces for `part`, if any.
    pub(crate) fn capture<'a>(&self, part: &'a str) -> Option<(&str, &'a str)> {
        match self {
            SectionKind::Named(name) | SectionKind::NamedRegex(name, _) => {
                Some((name.as_str(), part))
            }
            _ => None,
        }
    }
}

/// Errors raised while classifying a pattern segment.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    /// The regex inside `~...` or `{name:~...}` failed to compile.
    #[error("invalid regex in segment '{segment}': {reason}")]
    InvalidRegex {
        /// The offending raw segment.
        segment: String,
        /// Compiler diagnostic.
        reason: String,
    },
    /// The segment matches none of the recognized variants.
    #[error("unrecognized pattern segment '{segment}'")]
    Unrecognized {
        /// The offending raw segment.
        segment: String,
    },
}

fn named_regex_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{(\w+):~(.+)\}$").expect("named-regex shape"))
}

fn named_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{\w+\}$").expect("named shape"))
}

fn static_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.-]+$").expect("static shape"))
}

/// Compiles a segment expression into a full-segment-anchored regex.
fn compile_segment_regex(segment: &str, expr: &str) -> Result<Regex, PatternError> {
    Regex::new(&format!("^(?:{expr})$")).map_err(|e| PatternError::InvalidRegex {
        segment: segment.to_string(),
        reason: e.to_string(),
    })
}

/// Classifies a raw pattern segment into its variant.
///
/// Rules are tried in a fixed order; the first match decides:
/// `*`, `~regex`, `%s`/`%d` (case-insensitive), empty, `{name:~regex}`,
/// `{name}`, then a literal of `[\w.-]+`.
pub fn classify(segment: &str) -> Result<SectionKind, PatternError> {
    if segment == "*" {
        return Ok(SectionKind::MatchAll);
    }
    if let Some(expr) = segment.strip_prefix('~') {
        return Ok(SectionKind::Regex(compile_segment_regex(segment, expr)?));
    }
    if segment.eq_ignore_ascii_case("%s") {
        return Ok(SectionKind::Format(Format::Str));
    }
    if segment.eq_ignore_ascii_case("%d") {
        return Ok(SectionKind::Format(Format::Int));
    }
    if segment.is_empty() {
        return Ok(SectionKind::EmptyFinal);
    }
    if let Some(caps) = named_regex_shape().captures(segment) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let expr = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Ok(SectionKind::NamedRegex(
            name.to_string(),
            compile_segment_regex(segment, expr)?,
        ));
    }
    if named_shape().is_match(segment) {
        let name = &segment[1..segment.len() - 1];
        return Ok(SectionKind::Named(name.to_string()));
    }
    if static_shape().is_match(segment) {
        return Ok(SectionKind::Static);
    }
    Err(PatternError::Unrecognized {
        segment: segment.to_string(),
    })
}
