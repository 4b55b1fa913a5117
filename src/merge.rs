//! Header and query-string merge semantics.
//!
//! Headers merge case-insensitively with overwrite, except `set-cookie` which
//! always appends (multiple cookies coexist). Query parameters merge with
//! duplicate-value suppression and two passthrough-parameter conventions for
//! parameterized and intercepting route segments.

use crate::pattern::PatternMatch;
use crate::template;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Query parameter prefix marking "pass through and also bind the unprefixed
/// canonical name" (parameterized route segments).
pub const PASSTHROUGH_PARAM_PREFIX: &str = "nxtP";

/// Query parameter prefix for intercepting-route parameters; the canonical
/// name follows after the repeated-group marker syntax (`(.)`, `(..)`, ...).
pub const INTERCEPT_PARAM_PREFIX: &str = "nxtI";

/// Merge `source` headers into `target`. Values may be templates and are
/// substituted against `m` before merging. `set-cookie` appends; every other
/// name overwrites.
pub fn apply_headers<'a, I>(target: &mut HeaderMap, source: I, m: Option<&PatternMatch>)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (key, value) in source {
        let value = match m {
            Some(m) => template::substitute(value, m, false),
            None => value.to_string(),
        };
        set_header(target, key, &value);
    }
}

/// Set one header on `target`, appending rather than overwriting for
/// `set-cookie`. Invalid names or values are logged and skipped, never fatal.
pub fn set_header(target: &mut HeaderMap, key: &str, value: &str) {
    let name = match HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes()) {
        Ok(name) => name,
        Err(_) => {
            warn!(header = %key, "skipping invalid header name in merge");
            return;
        }
    };
    let value = match HeaderValue::from_str(value) {
        Ok(value) => value,
        Err(_) => {
            warn!(header = %key, "skipping invalid header value in merge");
            return;
        }
    };
    if name == SET_COOKIE {
        target.append(name, value);
    } else {
        target.insert(name, value);
    }
}

/// Copy every header of `source` into `target` with the same overwrite/append
/// rules (no template substitution).
pub fn apply_header_map(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        if name == SET_COOKIE {
            target.append(name.clone(), value.clone());
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Merge `source` query parameters into `target`.
///
/// - `nxtP<name>=v` keeps the prefixed parameter and binds `<name>=v`.
/// - `nxtI<marker><name>=v` keeps the prefixed parameter and binds `<name>=v`
///   with the leading repeated-group marker(s) stripped from the name.
/// - anything else appends only if the name is new or that exact value is not
///   already present (duplicate-value suppression, not duplicate-name).
pub fn apply_search_params(target: &mut Vec<(String, String)>, source: &[(String, String)]) {
    for (key, value) in source {
        if let Some(canonical) = key.strip_prefix(PASSTHROUGH_PARAM_PREFIX).filter(|r| !r.is_empty())
        {
            set_param(target, key, value);
            set_param(target, canonical, value);
        } else if let Some(rest) =
            key.strip_prefix(INTERCEPT_PARAM_PREFIX).filter(|r| !r.is_empty())
        {
            set_param(target, key, value);
            let canonical = strip_group_markers(rest);
            if !canonical.is_empty() {
                set_param(target, canonical, value);
            }
        } else if !target.iter().any(|(k, v)| k == key && v == value) {
            target.push((key.clone(), value.clone()));
        }
    }
}

/// Replace every value of `key` in `params` with the single given value.
fn set_param(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    params.retain(|(k, _)| k != key);
    params.push((key.to_string(), value.to_string()));
}

/// Strip leading `(.)` / `(..)` / `(...)` marker groups from an
/// intercepting-route parameter name.
fn strip_group_markers(name: &str) -> &str {
    let mut rest = name;
    loop {
        let Some(tail) = rest.strip_prefix('(') else { break };
        let dots = tail.chars().take_while(|&c| c == '.').count();
        if dots == 0 {
            break;
        }
        match tail[dots..].strip_prefix(')') {
            Some(after) => rest = after,
            None => break,
        }
    }
    rest
}

/// Render merged parameters back into a query string (no leading `?`).
#[must_use]
pub fn encode_search_params(params: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in params {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&urlencoding::encode(key));
        if !value.is_empty() {
            out.push('=');
            out.push_str(&urlencoding::encode(value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_group_markers() {
        assert_eq!(strip_group_markers("(.)photo"), "photo");
        assert_eq!(strip_group_markers("(..)(..)photo"), "photo");
        assert_eq!(strip_group_markers("(...)photo"), "photo");
        assert_eq!(strip_group_markers("photo"), "photo");
        assert_eq!(strip_group_markers("(x)photo"), "(x)photo");
    }

    #[test]
    fn test_set_param_replaces_all_values() {
        let mut params = vec![
            ("a".to_string(), "1".to_string()),
            ("a".to_string(), "2".to_string()),
        ];
        set_param(&mut params, "a", "3");
        assert_eq!(params, vec![("a".to_string(), "3".to_string())]);
    }

    #[test]
    fn test_set_cookie_appends_while_others_overwrite() {
        let mut target = HeaderMap::new();
        set_header(&mut target, "Set-Cookie", "session=abc");
        set_header(&mut target, "set-cookie", "theme=dark");
        set_header(&mut target, "content-type", "text/html");
        set_header(&mut target, "Content-Type", "application/json");

        let cookies: Vec<_> =
            target.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()).collect();
        assert_eq!(cookies, vec!["session=abc", "theme=dark"]);
        assert_eq!(target.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_apply_search_params_intercept_prefix_binds_canonical() {
        let mut target = Vec::new();
        let source = vec![("nxtI(..)photo".to_string(), "42".to_string())];
        apply_search_params(&mut target, &source);
        assert_eq!(
            target,
            vec![
                ("nxtI(..)photo".to_string(), "42".to_string()),
                ("photo".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_search_params_suppresses_exact_duplicates() {
        let mut target = vec![("a".to_string(), "1".to_string())];
        let source = vec![("a".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())];
        apply_search_params(&mut target, &source);
        assert_eq!(
            target,
            vec![("a".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())]
        );
    }
}
