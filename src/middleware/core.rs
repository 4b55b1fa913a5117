//! Interpretation of the middleware response protocol.
//!
//! A middleware handler communicates its decision through well-known response
//! headers rather than a structured return type: it may mutate the outbound
//! request's headers, rewrite the request to a new location, pass the request
//! through, or short-circuit with a full response of its own.

use crate::merge;
use crate::pipeline::RequestContext;
use crate::request::EdgeResponse;
use http::header::LOCATION;
use http::HeaderName;
use tracing::{debug, warn};

/// Comma list of request header names the middleware wants rewritten.
pub const OVERRIDE_HEADERS: &str = "x-middleware-override-headers";
/// Per-header companion of [`OVERRIDE_HEADERS`] carrying the new value.
pub const REQUEST_HEADER_PREFIX: &str = "x-middleware-request-";
/// New location for the request, relative or absolute.
pub const REWRITE_HEADER: &str = "x-middleware-rewrite";
/// Marker for "continue routing with the (possibly mutated) request".
pub const NEXT_HEADER: &str = "x-middleware-next";

/// Fold a middleware response into the routing context.
///
/// Protocol headers are consumed in order: request-header overrides first,
/// then a rewrite, then the next/short-circuit decision. Whatever headers
/// remain afterwards are merged into both the live outbound request and the
/// context's normal response headers.
pub fn apply_middleware_response(ctx: &mut RequestContext, resp: &mut EdgeResponse) {
    apply_header_overrides(ctx, resp);
    apply_rewrite(ctx, resp);

    let has_next = resp.headers.remove(NEXT_HEADER).is_some();
    let has_rewrite = ctx.rewritten_by_middleware;
    ctx.rewritten_by_middleware = false;
    let has_location = resp.headers.contains_key(LOCATION);

    if !has_next && !has_rewrite && !has_location {
        // the middleware produced the response itself
        ctx.body = Some(std::mem::take(&mut resp.body));
        ctx.status = Some(resp.status);
    } else if has_location && (300..400).contains(&resp.status) {
        ctx.status = Some(resp.status);
    }

    merge::apply_header_map(&mut ctx.request.headers, &resp.headers);
    merge::apply_header_map(&mut ctx.headers.normal, &resp.headers);
    ctx.headers.middleware_location = resp.get_header(LOCATION.as_str()).map(str::to_string);
}

/// Overwrite or delete outbound request headers named in
/// `x-middleware-override-headers`. A name listed without a companion
/// `x-middleware-request-<name>` value is deleted.
fn apply_header_overrides(ctx: &mut RequestContext, resp: &mut EdgeResponse) {
    let Some(list) = resp.get_header(OVERRIDE_HEADERS).map(str::to_string) else {
        return;
    };
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let companion = format!("{REQUEST_HEADER_PREFIX}{name}");
        match resp.get_header(&companion).map(str::to_string) {
            Some(value) => merge::set_header(&mut ctx.request.headers, name, &value),
            None => match HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) {
                Ok(header) => {
                    ctx.request.headers.remove(header);
                }
                Err(_) => warn!(header = %name, "skipping invalid header override name"),
            },
        }
        resp.headers.remove(companion);
    }
    resp.headers.remove(OVERRIDE_HEADERS);
}

/// Apply an `x-middleware-rewrite` header: same-host targets rewrite only the
/// path and merge the target's query parameters; cross-host targets replace
/// the path with the full URL so dispatch treats it as an external fetch.
fn apply_rewrite(ctx: &mut RequestContext, resp: &mut EdgeResponse) {
    let Some(rewrite) = resp.get_header(REWRITE_HEADER).map(str::to_string) else {
        return;
    };
    resp.headers.remove(REWRITE_HEADER);
    let target = match ctx.request.url.join(&rewrite) {
        Ok(url) => url,
        Err(err) => {
            warn!(
                request_id = %ctx.request.id,
                rewrite = %rewrite,
                error = %err,
                "ignoring unparseable middleware rewrite"
            );
            return;
        }
    };
    ctx.rewritten_by_middleware = true;

    let external = target.host_str() != ctx.request.url.host_str();
    let pairs: Vec<(String, String)> = target
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    ctx.path = if external {
        target.to_string()
    } else {
        target.path().to_string()
    };
    merge::apply_search_params(&mut ctx.search_params, &pairs);
    debug!(
        request_id = %ctx.request.id,
        path = %ctx.path,
        external,
        "middleware rewrite applied"
    );
}
