//! Evaluation of a rule's `has` / `missing` clauses against the current
//! request.

use crate::manifest::RouteCondition;
use crate::pattern::PatternCache;
use crate::template;
use http::HeaderMap;
use url::Url;

/// The request surfaces a condition may read. Query parameters come from the
/// context's merged set, not the raw URL, since earlier rules may already have
/// rewritten them.
pub struct RequestSurfaces<'a> {
    pub url: &'a Url,
    pub headers: &'a HeaderMap,
    pub cookies: &'a [(String, String)],
    pub search_params: &'a [(String, String)],
}

/// Outcome of checking one clause.
pub struct ConditionCheck {
    pub valid: bool,
    /// Candidate rewritten destination produced by the clause's named
    /// captures; the caller decides whether to adopt it.
    pub new_dest: Option<String>,
}

impl ConditionCheck {
    fn miss() -> Self {
        Self { valid: false, new_dest: None }
    }
}

/// Check a single condition. Condition patterns match case-sensitively, as
/// literally written; a missing `value` only checks presence.
///
/// When the clause pattern carries named captures and the enclosing rule has a
/// destination, a successful match also yields a candidate destination with
/// those captures substituted (`named_only`, so anonymous positional tokens in
/// the destination survive untouched).
#[must_use]
pub fn check_condition(
    condition: &RouteCondition,
    surfaces: &RequestSurfaces<'_>,
    dest: Option<&str>,
    patterns: &PatternCache,
) -> ConditionCheck {
    let (found, value) = match condition {
        RouteCondition::Host { value } => {
            (surfaces.url.host_str().map(str::to_string), value.as_deref())
        }
        RouteCondition::Header { key, value } => (
            surfaces
                .headers
                .get(key.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            value.as_deref(),
        ),
        RouteCondition::Cookie { key, value } => (
            surfaces
                .cookies
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, v)| v.clone()),
            value.as_deref(),
        ),
        RouteCondition::Query { key, value } => (
            surfaces
                .search_params
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, v)| v.clone()),
            value.as_deref(),
        ),
    };

    let Some(found) = found else {
        return ConditionCheck::miss();
    };
    let Some(pattern) = value else {
        // presence is enough
        return ConditionCheck { valid: true, new_dest: None };
    };

    let Some(m) = patterns.matches(pattern, &found, true) else {
        return ConditionCheck::miss();
    };

    let has_named_captures = m.keys.iter().any(Option::is_some);
    let new_dest = match (has_named_captures, dest) {
        (true, Some(dest)) => Some(template::substitute(dest, &m, true)),
        _ => None,
    };
    ConditionCheck { valid: true, new_dest }
}

/// Check a whole rule's condition lists: AND across `has`, AND of negations
/// across `missing`. Returns the (possibly condition-rewritten) destination on
/// success, `None` when the rule must be skipped.
#[must_use]
pub fn check_conditions(
    has: &[RouteCondition],
    missing: &[RouteCondition],
    surfaces: &RequestSurfaces<'_>,
    dest: Option<&str>,
    patterns: &PatternCache,
) -> Option<Option<String>> {
    let mut dest = dest.map(str::to_string);
    for condition in has {
        let result = check_condition(condition, surfaces, dest.as_deref(), patterns);
        if !result.valid {
            return None;
        }
        if let Some(new_dest) = result.new_dest {
            dest = Some(new_dest);
        }
    }
    for condition in missing {
        if check_condition(condition, surfaces, dest.as_deref(), patterns).valid {
            return None;
        }
    }
    Some(dest)
}
