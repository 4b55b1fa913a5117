//! Terminal dispatch: resolve the routed path to a build-output artifact and
//! produce the response.
//!
//! # Overview
//! Routing reduces a request to a final path plus accumulated status and
//! headers. Dispatch answers it: a handler invoked through the registry, an
//! artifact fetched from the asset store, an upstream fetch for absolute-URL
//! destinations, or a plain 404/500. Handler faults (errors and panics alike)
//! are contained at this boundary and degrade to a 500.

use crate::manifest::{
    compile_route_patterns, OutputEntry, OutputManifest, OverrideEntry, RoutesManifest,
};
use crate::merge;
use crate::pattern::PatternCache;
use crate::pipeline::{Pipeline, RequestContext};
use crate::request::{apply_geo_headers, is_url, EdgeRequest, EdgeResponse, GeoInfo};
use crate::scope::{RequestScope, ScopeRegistry};
use anyhow::{anyhow, Result};
use http::header::LOCATION;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

/// A registered edge function or middleware body.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &EdgeRequest, scope: &RequestScope) -> Result<EdgeResponse>;
}

impl<F> Handler for F
where
    F: Fn(&EdgeRequest, &RequestScope) -> Result<EdgeResponse> + Send + Sync,
{
    fn handle(&self, request: &EdgeRequest, scope: &RequestScope) -> Result<EdgeResponse> {
        self(request, scope)
    }
}

/// Handlers keyed by build-output entrypoint, registered once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: std::collections::HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entrypoint: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(entrypoint.into(), handler);
    }

    /// Register a plain closure as a handler.
    pub fn register_fn<F>(&mut self, entrypoint: impl Into<String>, handler: F)
    where
        F: Fn(&EdgeRequest, &RequestScope) -> Result<EdgeResponse> + Send + Sync + 'static,
    {
        self.register(entrypoint, Arc::new(handler));
    }

    /// Look up the handler for `entrypoint`. A manifest naming an entrypoint
    /// nobody registered is a deployment configuration error.
    pub fn get(&self, entrypoint: &str) -> Result<Arc<dyn Handler>> {
        self.handlers
            .get(entrypoint)
            .cloned()
            .ok_or_else(|| anyhow!("no handler registered for entrypoint `{entrypoint}`"))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("entrypoints", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Source of static build artifacts and upstream fetches. Implementations
/// decide how `request.url` maps to stored content.
pub trait AssetStore: Send + Sync {
    fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse>;
}

/// The assembled router: manifests, handlers, assets, and isolation scopes.
pub struct EdgeRouter {
    manifest: RoutesManifest,
    output: OutputManifest,
    registry: HandlerRegistry,
    assets: Arc<dyn AssetStore>,
    scopes: ScopeRegistry,
    locales: Vec<String>,
    patterns: PatternCache,
}

impl EdgeRouter {
    pub fn new(
        manifest: RoutesManifest,
        mut output: OutputManifest,
        registry: HandlerRegistry,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        let locales = manifest.collect_locales();
        fold_overrides(&mut output, &manifest.overrides);
        // Loader-validated manifests always compile; a hand-built manifest
        // with a malformed pattern degrades to per-use compilation, where the
        // bad source is skipped with a warning.
        let patterns = match compile_route_patterns(&manifest) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(error = %err, "pattern precompilation failed, matching will compile per use");
                PatternCache::new()
            }
        };
        Self {
            manifest,
            output,
            registry,
            assets,
            scopes: ScopeRegistry::new(),
            locales,
            patterns,
        }
    }

    /// Route one request to completion and dispatch the matched output.
    pub fn handle(&self, request: EdgeRequest) -> EdgeResponse {
        let mut ctx = RequestContext::new(request);
        let pipeline = Pipeline::new(
            &self.manifest,
            &self.output,
            &self.registry,
            &self.scopes,
            &self.locales,
            &self.patterns,
        );
        pipeline.find_match(&mut ctx);
        self.generate_response(ctx)
    }

    /// Like [`handle`](Self::handle), but first derives the synthetic geo
    /// request headers downstream handlers expect.
    pub fn handle_with_geo(&self, mut request: EdgeRequest, geo: &GeoInfo) -> EdgeResponse {
        apply_geo_headers(&mut request.headers, geo);
        self.handle(request)
    }

    /// Assemble the final response from the routed context: dispatch the
    /// terminal, then layer headers as normal, then the terminal's own, then
    /// important.
    fn generate_response(&self, mut ctx: RequestContext) -> EdgeResponse {
        // A redirect back to the matched path keeps the merged query string.
        let query = ctx.query_string();
        if !query.is_empty() {
            let location = ctx
                .headers
                .normal
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if location.as_deref() == Some(ctx.path.as_str()) {
                merge::set_header(
                    &mut ctx.headers.normal,
                    LOCATION.as_str(),
                    &format!("{}?{query}", ctx.path),
                );
            }
        }

        let resp = if let Some(body) = ctx.body.take() {
            EdgeResponse::with_body(ctx.status.unwrap_or(200), body)
        } else if is_url(&ctx.path) {
            self.fetch_upstream(&ctx)
        } else {
            self.dispatch_output(&ctx)
        };

        let mut headers = ctx.headers.normal.clone();
        merge::apply_header_map(&mut headers, &resp.headers);
        merge::apply_header_map(&mut headers, &ctx.headers.important);

        let status = ctx.status.unwrap_or(resp.status);
        info!(
            request_id = %ctx.request.id,
            path = %ctx.path,
            status,
            "request routed"
        );
        EdgeResponse { status, headers, body: resp.body }
    }

    /// Fetch an absolute-URL destination upstream, merging the accumulated
    /// query parameters into the target's own.
    fn fetch_upstream(&self, ctx: &RequestContext) -> EdgeResponse {
        let mut url = match Url::parse(&ctx.path) {
            Ok(url) => url,
            Err(err) => {
                error!(request_id = %ctx.request.id, url = %ctx.path, error = %err, "invalid upstream url");
                return EdgeResponse::text(500, reason_phrase(500));
            }
        };
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        merge::apply_search_params(&mut params, &ctx.search_params);
        let query = merge::encode_search_params(&params);
        url.set_query(if query.is_empty() { None } else { Some(&query) });

        let mut request = ctx.request.clone();
        request.url = url;
        match self.assets.fetch(&request) {
            Ok(resp) => resp,
            Err(err) => {
                error!(request_id = %ctx.request.id, url = %ctx.path, error = %err, "upstream fetch failed");
                EdgeResponse::text(500, reason_phrase(500))
            }
        }
    }

    /// Dispatch the build-output entry for the routed path.
    fn dispatch_output(&self, ctx: &RequestContext) -> EdgeResponse {
        let path = if ctx.path.is_empty() { "/" } else { ctx.path.as_str() };
        let entry = self.output.get(path);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_output_entry(ctx, path, entry)));
        match outcome {
            Ok(Ok(resp)) => resp,
            Ok(Err(err)) => {
                error!(request_id = %ctx.request.id, path = %path, error = %err, "dispatch failed");
                EdgeResponse::text(500, reason_phrase(500))
            }
            Err(_) => {
                error!(request_id = %ctx.request.id, path = %path, "handler panicked");
                EdgeResponse::text(500, reason_phrase(500))
            }
        }
    }

    fn run_output_entry(
        &self,
        ctx: &RequestContext,
        path: &str,
        entry: Option<&OutputEntry>,
    ) -> Result<EdgeResponse> {
        match entry {
            Some(OutputEntry::Function { entrypoint })
            | Some(OutputEntry::Middleware { entrypoint }) => {
                let handler = self.registry.get(entrypoint)?;
                let scope = self.scopes.scope_for(entrypoint);
                let request = self.request_for(ctx, path);
                handler.handle(&request, &scope)
            }
            Some(OutputEntry::Override { path: item_path, headers }) => {
                let mut resp = self.assets.fetch(&ctx.request.for_path(item_path))?;
                if let Some(headers) = headers {
                    merge::apply_headers(
                        &mut resp.headers,
                        headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                        None,
                    );
                }
                Ok(resp)
            }
            Some(OutputEntry::Static) => self.assets.fetch(&ctx.request.for_path(path)),
            None => Ok(EdgeResponse::text(404, reason_phrase(404))),
        }
    }

    /// The request handed to a function handler, re-addressed to the routed
    /// path with the merged query parameters.
    fn request_for(&self, ctx: &RequestContext, path: &str) -> EdgeRequest {
        let mut request = ctx.request.clone();
        request.url.set_path(path);
        let query = ctx.query_string();
        request
            .url
            .set_query(if query.is_empty() { None } else { Some(&query) });
        request
    }
}

/// Conventional reason phrase for the statuses the router emits itself.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
}

/// Fold the routes manifest's literal overrides into the output map, so they
/// dispatch like any other entry.
fn fold_overrides(output: &mut OutputManifest, overrides: &BTreeMap<String, OverrideEntry>) {
    for (key, entry) in overrides {
        let output_path = ensure_leading_slash(key);
        let artifact_path = ensure_leading_slash(&entry.path);
        let headers = entry
            .content_type
            .as_ref()
            .map(|ct| BTreeMap::from([("content-type".to_string(), ct.clone())]));
        output
            .entries
            .insert(output_path, OutputEntry::Override { path: artifact_path, headers });
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
