//! Locale-aware message bundle.
//!
//! Framework-produced messages (validation failures, built-in errors) are
//! resolved through a compiled-in table keyed by stable [`MessageId`]s, with
//! `{0}`-style positional placeholders. The locale is picked once from the
//! environment: `TRELLIS_LANG` first, then `LANG`, defaulting to English.

use std::sync::OnceLock;

/// Supported locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    /// English (default).
    En,
    /// Simplified Chinese.
    Zh,
}

impl Locale {
    /// Resolves the locale from the environment.
    ///
    /// Priority: `TRELLIS_LANG`, then `LANG` (`zh_CN.UTF-8` -> `zh`),
    /// falling back to English.
    pub fn from_env() -> Self {
        if let Ok(lang) = std::env::var("TRELLIS_LANG") {
            return Self::parse(&lang);
        }
        if let Ok(lang) = std::env::var("LANG") {
            let code = lang.split(['_', '.']).next().unwrap_or("");
            return Self::parse(code);
        }
        Locale::En
    }

    fn parse(code: &str) -> Self {
        match code {
            "zh" | "zh_CN" | "zh_TW" => Locale::Zh,
            _ => Locale::En,
        }
    }
}

/// Stable identifiers for framework messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    /// `{0}` = field name.
    ValidationRequired,
    /// `{0}` = field name, `{1}` = comma-joined sibling names.
    ValidationRequiredBy,
    /// `{0}` = field name, `{1}` = comma-joined sibling names.
    ValidationEither,
    /// `{0}` = field name, `{1}` = range literal.
    ValidationRange,
    /// `{0}` = field name, `{1}` = range literal.
    ValidationLength,
    /// `{0}` = field name.
    ValidationEmail,
    /// `{0}` = field name, `{1}` = offending value.
    BindCoercion,
    /// No parameters.
    ResourceNotFound,
    /// No parameters.
    TooManyRequests,
    /// No parameters.
    CircuitBroken,
}

fn template(locale: Locale, id: MessageId) -> &'static str {
    use MessageId::*;
    match (locale, id) {
        (Locale::En, ValidationRequired) => "Field '{0}' is required",
        (Locale::En, ValidationRequiredBy) => "Field '{0}' is required when any of [{1}] is set",
        (Locale::En, ValidationEither) => "At least one of '{0}' or [{1}] must be set",
        (Locale::En, ValidationRange) => "Field '{0}' must be within {1}",
        (Locale::En, ValidationLength) => "Field '{0}' length must be within {1}",
        (Locale::En, ValidationEmail) => "Field '{0}' must be a valid email address",
        (Locale::En, BindCoercion) => "Cannot parse value '{1}' for field '{0}'",
        (Locale::En, ResourceNotFound) => "Resource not found",
        (Locale::En, TooManyRequests) => "Too many requests",
        (Locale::En, CircuitBroken) => "The request was blocked",

        (Locale::Zh, ValidationRequired) => "字段'{0}'不能为空",
        (Locale::Zh, ValidationRequiredBy) => "当[{1}]中任一字段非空时，字段'{0}'不能为空",
        (Locale::Zh, ValidationEither) => "字段'{0}'与[{1}]中至少一个不能为空",
        (Locale::Zh, ValidationRange) => "字段'{0}'必须在{1}范围内",
        (Locale::Zh, ValidationLength) => "字段'{0}'的长度必须在{1}范围内",
        (Locale::Zh, ValidationEmail) => "字段'{0}'必须是合法的邮箱地址",
        (Locale::Zh, BindCoercion) => "无法将值'{1}'解析到字段'{0}'",
        (Locale::Zh, ResourceNotFound) => "资源不存在",
        (Locale::Zh, TooManyRequests) => "请求过于频繁",
        (Locale::Zh, CircuitBroken) => "请求已被熔断",
    }
}

fn active_locale() -> Locale {
    static LOCALE: OnceLock<Locale> = OnceLock::new();
    *LOCALE.get_or_init(Locale::from_env)
}

/// Resolves a message in the active locale, substituting `{n}` placeholders
/// with the given arguments. Placeholders without a matching argument are
/// left verbatim.
#[must_use]
pub fn message(id: MessageId, args: &[&str]) -> String {
    format_template(template(active_locale(), id), args)
}

/// Resolves a message in an explicit locale.
#[must_use]
pub fn message_in(locale: Locale, id: MessageId, args: &[&str]) -> String {
    format_template(template(locale, id), args)
}

fn format_template(tpl: &str, args: &[&str]) -> String {
    let mut out = tpl.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), arg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_positional_args() {
        let msg = message_in(Locale::En, MessageId::ValidationRange, &["age", "[1,10]"]);
        assert_eq!(msg, "Field 'age' must be within [1,10]");
    }

    #[test]
    fn missing_args_left_verbatim() {
        let msg = message_in(Locale::En, MessageId::ValidationRange, &["age"]);
        assert!(msg.contains("{1}"));
    }

    #[test]
    fn locale_parse_falls_back_to_english() {
        assert_eq!(Locale::parse("fr"), Locale::En);
        assert_eq!(Locale::parse("zh"), Locale::Zh);
    }

    #[test]
    fn all_ids_have_both_locales() {
        use MessageId::*;
        for id in [
            ValidationRequired,
            ValidationRequiredBy,
            ValidationEither,
            ValidationRange,
            ValidationLength,
            ValidationEmail,
            BindCoercion,
            ResourceNotFound,
            TooManyRequests,
            CircuitBroken,
        ] {
            assert!(!template(Locale::En, id).is_empty());
            assert!(!template(Locale::Zh, id).is_empty());
        }
    }
}
