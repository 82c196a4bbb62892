//! Mount-time validator compilation.
//!
//! Each field's `validate` tag is a semicolon-separated list of fragments.
//! At mount time every fragment is compiled into a closure bound to its
//! field descriptor; the closures for a record compose in order into a
//! single [`Validator`]. Unclaimed fragments are ignored, which lets
//! applications register their own fragment-claiming validators without
//! breaking built-in compilation.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use trellis_core::i18n::{self, MessageId};
use trellis_core::Problem;

use crate::record::{FieldSpec, Record};
use crate::value::FieldValue;

/// Errors raised while compiling validators at mount time.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    /// A range/length fragment has its bounds inverted.
    #[error("field '{field}': inverted bounds in '{fragment}'")]
    InvertedBounds {
        /// The field carrying the fragment.
        field: &'static str,
        /// The offending fragment.
        fragment: String,
    },

    /// A range/length fragment could not be parsed.
    #[error("field '{field}': malformed bounds in '{fragment}'")]
    MalformedBounds {
        /// The field carrying the fragment.
        field: &'static str,
        /// The offending fragment.
        fragment: String,
    },

    /// A bounds fragment was applied to a kind that supports neither a
    /// numeric range nor a string length.
    #[error("field '{field}': '{fragment}' does not apply to this field kind")]
    UnsupportedFragment {
        /// The field carrying the fragment.
        field: &'static str,
        /// The offending fragment.
        fragment: String,
    },

    /// Compiling a nested record's validator failed.
    #[error("field '{field}': {source}")]
    Nested {
        /// The nested field.
        field: &'static str,
        /// The inner failure.
        #[source]
        source: Box<BuildError>,
    },
}

/// A compiled per-field rule.
pub type Rule<T> = Box<dyn Fn(&T) -> Result<(), Problem> + Send + Sync>;

/// A rule erased over the record type, for application-registered
/// validators: it sees only the field's typed value view.
pub type ErasedRule = Arc<dyn Fn(FieldValue<'_>) -> Result<(), Problem> + Send + Sync>;

/// An application-registered validator: claims fragments and compiles them
/// into erased rules.
pub trait RuleFactory: Send + Sync {
    /// Whether this factory claims the fragment.
    fn claims(&self, fragment: &str) -> bool;

    /// Compiles the fragment into a rule for the named field.
    fn compile(&self, fragment: &str, field: &'static str) -> Result<ErasedRule, BuildError>;
}

/// The set of application-registered validators.
#[derive(Clone, Default)]
pub struct CustomValidators {
    factories: Vec<Arc<dyn RuleFactory>>,
}

impl CustomValidators {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. Registration happens during application build
    /// only; the serving path never mutates this set.
    pub fn register(&mut self, factory: Arc<dyn RuleFactory>) {
        self.factories.push(factory);
    }

    fn find(&self, fragment: &str) -> Option<&Arc<dyn RuleFactory>> {
        self.factories.iter().find(|f| f.claims(fragment))
    }
}

/// The compiled validator for a record type.
pub struct Validator<T> {
    rules: Vec<Rule<T>>,
}

impl<T> std::fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl<T> Validator<T> {
    /// Runs every rule in order; the first failure is returned.
    pub fn check(&self, record: &T) -> Result<(), Problem> {
        for rule in &self.rules {
            rule(record)?;
        }
        Ok(())
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules were compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compiles the validator for a record using only built-in rules.
pub fn compile_builtin<T: Record>() -> Result<Validator<T>, BuildError> {
    compile::<T>(&CustomValidators::default())
}

/// Compiles the validator for a record, consulting application-registered
/// validators for fragments the built-ins do not claim.
pub fn compile<T: Record>(customs: &CustomValidators) -> Result<Validator<T>, BuildError> {
    let probe = T::default();
    let mut rules: Vec<Rule<T>> = Vec::new();

    for spec in T::FIELDS {
        if let Some(nested) = spec.nested {
            let sub = nested().map_err(|e| BuildError::Nested {
                field: spec.name,
                source: Box::new(e),
            })?;
            rules.push(sub);
        }

        for fragment in spec
            .validate
            .split(';')
            .map(str::trim)
            .filter(|f| !f.is_empty())
        {
            if let Some(rule) = compile_fragment::<T>(fragment, spec, &probe)? {
                rules.push(rule);
            } else if let Some(factory) = customs.find(fragment) {
                let erased = factory.compile(fragment, spec.name)?;
                let get = spec.get;
                rules.push(Box::new(move |record: &T| erased(get(record))));
            }
            // Unclaimed fragments are dropped.
        }
    }
    Ok(Validator { rules })
}

fn compile_fragment<T: Record>(
    fragment: &str,
    spec: &'static FieldSpec<T>,
    probe: &T,
) -> Result<Option<Rule<T>>, BuildError> {
    if fragment == "required" {
        let get = spec.get;
        let field = spec.name;
        return Ok(Some(Box::new(move |record: &T| {
            if get(record).is_zero() {
                Err(Problem::invalid_field(
                    field,
                    i18n::message(MessageId::ValidationRequired, &[field]),
                ))
            } else {
                Ok(())
            }
        })));
    }

    if let Some(names) = fragment.strip_prefix("required_by=") {
        let siblings = resolve_siblings::<T>(names);
        let joined = join_names(&siblings);
        let get = spec.get;
        let field = spec.name;
        return Ok(Some(Box::new(move |record: &T| {
            let triggered = siblings.iter().any(|s| !(s.get)(record).is_zero());
            if triggered && get(record).is_zero() {
                Err(Problem::invalid_field(
                    field,
                    i18n::message(MessageId::ValidationRequiredBy, &[field, &joined]),
                ))
            } else {
                Ok(())
            }
        })));
    }

    if let Some(names) = fragment.strip_prefix("either=") {
        let siblings = resolve_siblings::<T>(names);
        let joined = join_names(&siblings);
        let get = spec.get;
        let field = spec.name;
        return Ok(Some(Box::new(move |record: &T| {
            let any_set = !get(record).is_zero()
                || siblings.iter().any(|s| !(s.get)(record).is_zero());
            if any_set {
                Ok(())
            } else {
                Err(Problem::invalid_field(
                    field,
                    i18n::message(MessageId::ValidationEither, &[field, &joined]),
                ))
            }
        })));
    }

    if fragment == "email" {
        let get = spec.get;
        let field = spec.name;
        return Ok(Some(Box::new(move |record: &T| {
            let value = get(record);
            let Some(s) = value.as_str() else {
                return Ok(());
            };
            if s.is_empty() || email_regex().is_match(s) {
                Ok(())
            } else {
                Err(Problem::invalid_field(
                    field,
                    i18n::message(MessageId::ValidationEmail, &[field]),
                ))
            }
        })));
    }

    if fragment.starts_with('[') || fragment.starts_with('(') {
        let bounds = Bounds::parse(fragment).ok_or_else(|| BuildError::MalformedBounds {
            field: spec.name,
            fragment: fragment.to_string(),
        })?;
        if let (Some(lo), Some(hi)) = (bounds.lo, bounds.hi) {
            if lo > hi {
                return Err(BuildError::InvertedBounds {
                    field: spec.name,
                    fragment: fragment.to_string(),
                });
            }
        }

        let kind = (spec.get)(probe);
        let get = spec.get;
        let field = spec.name;
        return match kind {
            FieldValue::Int(_) | FieldValue::Uint(_) | FieldValue::Float(_) => {
                Ok(Some(Box::new(move |record: &T| {
                    let value = get(record);
                    if value.is_zero() {
                        return Ok(());
                    }
                    let n = value.as_number().unwrap_or(0.0);
                    if bounds.contains(n) {
                        Ok(())
                    } else {
                        Err(Problem::invalid_field(
                            field,
                            i18n::message(MessageId::ValidationRange, &[field, &bounds.literal]),
                        ))
                    }
                })))
            }
            FieldValue::Str(_) => Ok(Some(Box::new(move |record: &T| {
                let value = get(record);
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                if s.is_empty() {
                    return Ok(());
                }
                let len = s.chars().count() as f64;
                if bounds.contains(len) {
                    Ok(())
                } else {
                    Err(Problem::invalid_field(
                        field,
                        i18n::message(MessageId::ValidationLength, &[field, &bounds.literal]),
                    ))
                }
            }))),
            _ => Err(BuildError::UnsupportedFragment {
                field: spec.name,
                fragment: fragment.to_string(),
            }),
        };
    }

    Ok(None)
}

fn resolve_siblings<T: Record>(names: &str) -> Vec<&'static FieldSpec<T>> {
    // Unknown names are silently dropped.
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .filter_map(T::field)
        .collect()
}

fn join_names<T>(siblings: &[&'static FieldSpec<T>]) -> String {
    siblings
        .iter()
        .map(|s| s.name)
        .collect::<Vec<_>>()
        .join(",")
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\w-]+(\.[\w-]+)*@[\w-]+(\.[\w-]+)+$").expect("email regex")
    })
}

/// Parsed interval bounds: `[lo,hi]`, `(lo,hi)`, `[lo,hi)`, `(lo,hi]`.
/// An empty bound means unbounded on that side.
#[derive(Debug, Clone)]
struct Bounds {
    lo: Option<f64>,
    hi: Option<f64>,
    lo_inclusive: bool,
    hi_inclusive: bool,
    literal: String,
}

impl Bounds {
    fn parse(fragment: &str) -> Option<Self> {
        let lo_inclusive = match fragment.chars().next()? {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let hi_inclusive = match fragment.chars().last()? {
            ']' => true,
            ')' => false,
            _ => return None,
        };
        let inner = &fragment[1..fragment.len() - 1];
        let (lo_raw, hi_raw) = inner.split_once(',')?;
        let lo = parse_bound(lo_raw)?;
        let hi = parse_bound(hi_raw)?;
        Some(Self {
            lo,
            hi,
            lo_inclusive,
            hi_inclusive,
            literal: fragment.to_string(),
        })
    }

    fn contains(&self, n: f64) -> bool {
        if let Some(lo) = self.lo {
            if self.lo_inclusive {
                if n < lo {
                    return false;
                }
            } else if n <= lo {
                return false;
            }
        }
        if let Some(hi) = self.hi {
            if self.hi_inclusive {
                if n > hi {
                    return false;
                }
            } else if n >= hi {
                return false;
            }
        }
        true
    }
}

/// Parses one bound; empty means unbounded. Returns `None` (malformed) for
/// non-numeric text.
#[allow(clippy::option_option)]
fn parse_bound(raw: &str) -> Option<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    raw.parse::<f64>().ok().map(Some)
}
