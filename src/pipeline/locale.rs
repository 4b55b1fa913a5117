//! Locale-aware routing: miss-phase source loosening, locale-prefix stripping,
//! and cookie/`Accept-Language`-driven redirects.

use super::core::RequestContext;
use crate::manifest::{OutputManifest, Phase, RouteRule};
use crate::merge;
use crate::pattern::PatternCache;
use http::header::LOCATION;
use std::borrow::Cow;
use tracing::debug;

/// In the `miss` phase, a rule whose source is a disjunction of known locale
/// codes followed by a path capture gets its trailing `/(.*)$` loosened to an
/// optional group, so locale-prefixed and bare paths both match.
#[must_use]
pub(crate) fn locale_friendly_rule<'a>(
    rule: &'a RouteRule,
    phase: Phase,
    locales: &[String],
) -> Cow<'a, RouteRule> {
    if phase != Phase::Miss || locales.is_empty() || !is_locale_alternation(&rule.src, locales) {
        return Cow::Borrowed(rule);
    }
    let mut loosened = rule.clone();
    let base = &rule.src[..rule.src.len() - "/(.*)$".len()];
    loosened.src = format!("{base}(?:/(.*))?$");
    Cow::Owned(loosened)
}

fn is_locale_alternation(src: &str, locales: &[String]) -> bool {
    let Some(rest) = src.strip_prefix("^/(?:").or_else(|| src.strip_prefix("^/(")) else {
        return false;
    };
    let Some(body) = rest.strip_suffix(")/(.*)$") else {
        return false;
    };
    !body.is_empty() && body.split('|').all(|code| locales.iter().any(|l| l == code))
}

/// Strip a matched locale prefix from `path` when the unprefixed path is a
/// known output. Applied after the `none` phase's rules are exhausted.
#[must_use]
pub(crate) fn strip_locale_prefix(
    path: &str,
    locales: &[String],
    output: &OutputManifest,
) -> Option<String> {
    for locale in locales {
        let Some(rest) = path.strip_prefix('/').and_then(|p| p.strip_prefix(locale.as_str()))
        else {
            continue;
        };
        if !rest.is_empty() && !rest.starts_with('/') {
            continue;
        }
        let candidate = if rest.is_empty() { "/" } else { rest };
        if output.contains(candidate) {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Apply a locale-cookie / `Accept-Language`-driven redirect for `rule`.
///
/// Only triggers for whole-path rules matching the original request path with
/// no location header already set. The ranked preference list is the locale
/// cookie first, then the `Accept-Language` header, both quality-sorted; the
/// first preference with a configured target wins, issued as a 307 unless the
/// current path already starts with that target.
pub(crate) fn apply_locale_redirects(
    ctx: &mut RequestContext,
    rule: &RouteRule,
    patterns: &PatternCache,
) {
    let Some(redirects) = rule.locale.as_ref().and_then(|l| l.redirect.as_ref()) else {
        return;
    };
    if ctx.headers.normal.contains_key(LOCATION) || ctx.headers.important.contains_key(LOCATION) {
        return;
    }
    if !rule.src.starts_with('^') || !rule.src.ends_with('$') {
        return;
    }
    let original_path = ctx.request.url.path().to_string();
    if patterns.matches(&rule.src, &original_path, rule.case_sensitive).is_none() {
        return;
    }

    let mut preferences: Vec<String> = Vec::new();
    if let Some(cookie_name) = rule.locale.as_ref().and_then(|l| l.cookie.as_ref()) {
        if let Some((_, value)) = ctx.cookies.iter().find(|(name, _)| name == cookie_name) {
            preferences.extend(parse_quality_list(value));
        }
    }
    if let Some(accept) = ctx.request.get_header("accept-language") {
        preferences.extend(parse_quality_list(accept));
    }
    dedupe_in_place(&mut preferences);

    for preference in &preferences {
        let Some(target) = redirects.get(preference) else {
            continue;
        };
        if !ctx.path.starts_with(target.as_str()) {
            merge::set_header(&mut ctx.headers.normal, "location", target);
            ctx.status = Some(307);
            debug!(
                request_id = %ctx.request.id,
                locale = %preference,
                target = %target,
                "locale redirect chosen"
            );
        }
        return;
    }
}

/// Parse a quality-weighted comma list (`en;q=0.9,de;q=0.5`) into codes sorted
/// descending by weight. The sort is stable, so equal weights keep list order.
#[must_use]
pub(crate) fn parse_quality_list(value: &str) -> Vec<String> {
    let mut entries: Vec<(String, f64)> = value
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.trim().split(';');
            let code = parts.next()?.trim();
            if code.is_empty() {
                return None;
            }
            let weight = parts
                .find_map(|p| p.trim().strip_prefix("q=").map(str::to_string))
                .and_then(|q| q.parse::<f64>().ok())
                .unwrap_or(1.0);
            Some((code.to_string(), weight))
        })
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.into_iter().map(|(code, _)| code).collect()
}

fn dedupe_in_place(values: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(values.len());
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}
