//! The phase-based route matching state machine.
//!
//! # Overview
//! A request walks an ordered chain of phases (`none`, `filesystem`,
//! `rewrite`, `resource`, `miss`, `hit`, `error`), each holding an ordered
//! rule list from the build manifest. Rules match against the mutable request
//! context and fold their effects into it: rewritten paths, merged query
//! parameters, accumulated headers, a response status, middleware side
//! effects. A rule's `check` flag re-enters the machine mid-phase; a global
//! counter caps re-entries so cyclic manifests degrade to a 500 instead of
//! spinning.

use crate::conditions::{check_conditions, RequestSurfaces};
use crate::dispatcher::HandlerRegistry;
use crate::manifest::{OutputEntry, OutputManifest, Phase, RouteRule, RoutesManifest};
use crate::merge;
use crate::middleware;
use crate::pattern::{PatternCache, PatternMatch};
use crate::request::{is_url, parse_cookies, EdgeRequest};
use crate::scope::ScopeRegistry;
use crate::template;
use http::header::LOCATION;
use http::HeaderMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

use super::locale;

/// Phase re-entries allowed per `run` before routing is declared cyclic.
pub const MAX_PHASE_CHECKS: u32 = 50;

/// Response headers accumulated while routing, in two precedence tiers.
/// Important headers are applied last during response assembly, so they win
/// over both normal headers and handler response headers.
#[derive(Debug, Default)]
pub struct ContextHeaders {
    pub normal: HeaderMap,
    pub important: HeaderMap,
    /// Location header produced by a middleware, tracked separately because it
    /// terminates the current phase scan.
    pub middleware_location: Option<String>,
}

/// Mutable per-request routing state.
#[derive(Debug)]
pub struct RequestContext {
    /// The live outbound request. Middleware may mutate its headers.
    pub request: EdgeRequest,
    pub cookies: Vec<(String, String)>,
    /// Current path, rewritten as rules apply. Becomes a full URL when a rule
    /// or middleware rewrites to a different host.
    pub path: String,
    /// Merged query parameters, in insertion order.
    pub search_params: Vec<(String, String)>,
    pub status: Option<u16>,
    pub headers: ContextHeaders,
    /// Response body supplied directly by a middleware, ending routing.
    pub body: Option<Vec<u8>>,
    /// Middleware already run in the current phase scan.
    pub middleware_invoked: Vec<String>,
    pub check_phase_counter: u32,
    /// Set transiently while folding in a middleware response.
    pub(crate) rewritten_by_middleware: bool,
}

impl RequestContext {
    pub fn new(request: EdgeRequest) -> Self {
        let cookies = parse_cookies(&request.headers);
        let path = match request.url.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        let mut search_params = Vec::new();
        let pairs: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        merge::apply_search_params(&mut search_params, &pairs);
        Self {
            request,
            cookies,
            path,
            search_params,
            status: None,
            headers: ContextHeaders::default(),
            body: None,
            middleware_invoked: Vec::new(),
            check_phase_counter: 0,
            rewritten_by_middleware: false,
        }
    }

    /// The merged query parameters rendered as a query string, without `?`.
    #[must_use]
    pub fn query_string(&self) -> String {
        merge::encode_search_params(&self.search_params)
    }
}

/// Outcome of checking one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteStatus {
    /// Rule did not apply.
    Skip,
    /// Rule applied; keep scanning the phase.
    Next,
    /// Rule applied and terminated routing.
    Done,
    Error,
}

/// Outcome of a whole phase (and of routing as a whole).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Done,
    Error,
}

impl From<PhaseStatus> for RouteStatus {
    fn from(status: PhaseStatus) -> Self {
        match status {
            PhaseStatus::Done => RouteStatus::Done,
            PhaseStatus::Error => RouteStatus::Error,
        }
    }
}

/// The routing engine, borrowing the immutable router configuration.
pub struct Pipeline<'a> {
    manifest: &'a RoutesManifest,
    output: &'a OutputManifest,
    registry: &'a HandlerRegistry,
    scopes: &'a ScopeRegistry,
    locales: &'a [String],
    patterns: &'a PatternCache,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        manifest: &'a RoutesManifest,
        output: &'a OutputManifest,
        registry: &'a HandlerRegistry,
        scopes: &'a ScopeRegistry,
        locales: &'a [String],
        patterns: &'a PatternCache,
    ) -> Self {
        Self { manifest, output, registry, scopes, locales, patterns }
    }

    /// Route `ctx` to completion: the main chain first, then one pass over the
    /// `error` phase if the main chain errored or resolved to a 4xx/5xx.
    pub fn find_match(&self, ctx: &mut RequestContext) -> PhaseStatus {
        let result = self.run(ctx, Phase::None);
        if result == PhaseStatus::Error || ctx.status.is_some_and(|s| s >= 400) {
            self.run(ctx, Phase::Error)
        } else {
            result
        }
    }

    /// One full run of the phase machine starting at `phase`, with a fresh
    /// re-entry budget. A location header left without a redirect status
    /// defaults to a temporary redirect.
    fn run(&self, ctx: &mut RequestContext, phase: Phase) -> PhaseStatus {
        ctx.check_phase_counter = 0;
        let result = self.check_phase(ctx, phase);
        if ctx.headers.normal.contains_key(LOCATION)
            && !ctx.status.is_some_and(|s| (300..400).contains(&s))
        {
            ctx.status = Some(307);
        }
        result
    }

    fn check_phase(&self, ctx: &mut RequestContext, phase: Phase) -> PhaseStatus {
        if ctx.check_phase_counter >= MAX_PHASE_CHECKS {
            error!(
                request_id = %ctx.request.id,
                path = %ctx.request.url.path(),
                "routing encountered an infinite loop"
            );
            ctx.status = Some(500);
            return PhaseStatus::Error;
        }
        ctx.check_phase_counter += 1;
        debug!(request_id = %ctx.request.id, %phase, path = %ctx.path, "checking phase");

        // A new phase scan may re-run middleware.
        ctx.middleware_invoked.clear();

        let mut should_continue = true;
        for rule in self.manifest.phase_rules(phase) {
            match self.check_route(ctx, phase, rule) {
                RouteStatus::Error => return PhaseStatus::Error,
                RouteStatus::Done => {
                    should_continue = false;
                    break;
                }
                RouteStatus::Skip | RouteStatus::Next => {}
            }
        }
        if !should_continue {
            return PhaseStatus::Done;
        }

        if phase == Phase::None {
            if let Some(stripped) = locale::strip_locale_prefix(&ctx.path, self.locales, self.output)
            {
                ctx.path = stripped;
            }
        }

        let mut path_exists = self.output.contains(&ctx.path);
        if !path_exists && ctx.path.ends_with('/') {
            let trimmed = ctx.path[..ctx.path.len() - 1].to_string();
            if self.output.contains(&trimmed) {
                ctx.path = trimmed;
                path_exists = true;
            }
        }

        if phase == Phase::Miss && !path_exists && ctx.status.map_or(true, |s| s < 400) {
            ctx.status = Some(404);
        }

        if phase == Phase::Hit || is_url(&ctx.path) {
            return PhaseStatus::Done;
        }

        let next_phase = if path_exists || phase == Phase::Miss || phase == Phase::Error {
            Phase::Hit
        } else {
            phase.next()
        };
        self.check_phase(ctx, next_phase)
    }

    fn check_route(&self, ctx: &mut RequestContext, phase: Phase, rule: &RouteRule) -> RouteStatus {
        let rule = locale::locale_friendly_rule(rule, phase, self.locales);

        // Loosened locale variants are the only sources not in the cache.
        let Some(src_match) = self.patterns.matches(&rule.src, &ctx.path, rule.case_sensitive)
        else {
            return RouteStatus::Skip;
        };
        if !rule.allows_method(&ctx.request.method) {
            return RouteStatus::Skip;
        }
        let surfaces = RequestSurfaces {
            url: &ctx.request.url,
            headers: &ctx.request.headers,
            cookies: &ctx.cookies,
            search_params: &ctx.search_params,
        };
        let Some(dest) =
            check_conditions(&rule.has, &rule.missing, &surfaces, rule.dest.as_deref(), self.patterns)
        else {
            return RouteStatus::Skip;
        };
        // Error-phase rules carrying a status select on the status accumulated
        // so far; a status-less rule applies to any error.
        if phase == Phase::Error {
            if let Some(required) = rule.status {
                if ctx.status != Some(required) {
                    return RouteStatus::Skip;
                }
            }
        }
        if let Some(mw_path) = &rule.middleware_path {
            if ctx.middleware_invoked.iter().any(|p| p == mw_path) {
                return RouteStatus::Skip;
            }
        }
        debug!(request_id = %ctx.request.id, %phase, src = %rule.src, "rule matched");

        if rule.override_ {
            ctx.status = None;
            ctx.headers.normal.clear();
            ctx.headers.important.clear();
        }

        locale::apply_locale_redirects(ctx, &rule, self.patterns);

        if let Some(mw_path) = &rule.middleware_path {
            if !self.run_route_middleware(ctx, mw_path) {
                return RouteStatus::Error;
            }
            if ctx.body.is_some() || ctx.headers.middleware_location.is_some() {
                return RouteStatus::Done;
            }
        }

        if let Some(headers) = &rule.headers {
            let target = if rule.important {
                &mut ctx.headers.important
            } else {
                &mut ctx.headers.normal
            };
            merge::apply_headers(
                target,
                headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                Some(&src_match),
            );
        }
        if let Some(status) = rule.status {
            ctx.status = Some(status);
        }

        let prev_path = self.apply_route_dest(ctx, dest.as_deref(), &src_match);

        if rule.check && !is_url(&ctx.path) {
            if prev_path == ctx.path {
                if phase != Phase::Miss {
                    return self.check_phase(ctx, phase.next()).into();
                }
                // The path didn't change but still isn't a known output, so
                // start over from the filesystem phase.
                let trimmed = ctx.path.strip_suffix('/').unwrap_or(&ctx.path);
                if !self.output.contains(&ctx.path) && !self.output.contains(trimmed) {
                    return self.check_phase(ctx, Phase::Filesystem).into();
                }
            } else {
                return self.check_phase(ctx, Phase::None).into();
            }
        }

        if !rule.continue_ {
            return RouteStatus::Done;
        }
        if rule.status.is_some_and(|s| (300..400).contains(&s)) {
            return RouteStatus::Done;
        }
        RouteStatus::Next
    }

    /// Rewrite the context path/query to the rule's destination. Returns the
    /// path as it was before the rewrite.
    fn apply_route_dest(
        &self,
        ctx: &mut RequestContext,
        dest: Option<&str>,
        src_match: &PatternMatch,
    ) -> String {
        let prev_path = ctx.path.clone();
        let Some(dest) = dest else {
            return prev_path;
        };

        let mut processed = template::substitute(dest, src_match, false);
        if is_url(&processed) {
            ctx.path = processed;
            return prev_path;
        }
        if !processed.starts_with('/') {
            processed.insert(0, '/');
        }

        let dest_url = match ctx.request.url.join(&processed) {
            Ok(url) => url,
            Err(err) => {
                warn!(
                    request_id = %ctx.request.id,
                    dest = %processed,
                    error = %err,
                    "ignoring unparseable rule destination"
                );
                return prev_path;
            }
        };
        let pairs: Vec<(String, String)> = dest_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        merge::apply_search_params(&mut ctx.search_params, &pairs);
        ctx.path = dest_url.path().to_string();

        // A root-level RSC payload aliases back to the path it was derived
        // from, except at the root itself.
        if ctx.path.to_ascii_lowercase().ends_with("/index.rsc")
            && !matches!(prev_path.to_ascii_lowercase().as_str(), "/" | "/index")
        {
            ctx.path = prev_path.clone();
        }
        // RSC paths with no dedicated output fall back to the page output.
        if ctx.path.to_ascii_lowercase().ends_with(".rsc") && !self.output.contains(&ctx.path) {
            ctx.path.truncate(ctx.path.len() - ".rsc".len());
        }

        debug!(request_id = %ctx.request.id, from = %prev_path, to = %ctx.path, "destination applied");
        prev_path
    }

    /// Run the middleware registered for `mw_path` and fold its response into
    /// the context. Returns `false` on any failure, with the status already
    /// set to 500.
    fn run_route_middleware(&self, ctx: &mut RequestContext, mw_path: &str) -> bool {
        let Some(OutputEntry::Middleware { entrypoint }) = self.output.get(mw_path) else {
            error!(
                request_id = %ctx.request.id,
                middleware = %mw_path,
                "manifest names a middleware that is not in the build output"
            );
            ctx.status = Some(500);
            return false;
        };
        let handler = match self.registry.get(entrypoint) {
            Ok(handler) => handler,
            Err(err) => {
                error!(
                    request_id = %ctx.request.id,
                    middleware = %mw_path,
                    error = %err,
                    "middleware handler is not registered"
                );
                ctx.status = Some(500);
                return false;
            }
        };
        let scope = self.scopes.scope_for(entrypoint);
        let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(&ctx.request, &scope)));
        let mut resp = match outcome {
            Ok(Ok(resp)) => resp,
            Ok(Err(err)) => {
                error!(
                    request_id = %ctx.request.id,
                    middleware = %mw_path,
                    error = %err,
                    "middleware returned an error"
                );
                ctx.status = Some(500);
                return false;
            }
            Err(_) => {
                error!(
                    request_id = %ctx.request.id,
                    middleware = %mw_path,
                    "middleware panicked"
                );
                ctx.status = Some(500);
                return false;
            }
        };
        if resp.status == 500 {
            ctx.status = Some(500);
            return false;
        }
        ctx.middleware_invoked.push(mw_path.to_string());
        middleware::apply_middleware_response(ctx, &mut resp);
        true
    }
}
