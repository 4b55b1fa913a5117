mod common;

use common::{body_text, get, output, router, routes, InMemoryAssets};
use edge_router::{EdgeResponse, HandlerRegistry};
use serde_json::json;

#[test]
fn test_unregistered_entrypoint_is_500() {
    let output = output(json!({
        "/page": { "type": "function", "entrypoint": "missing.func" }
    }));
    let router = router(
        routes(json!({ "version": 3, "routes": {} })),
        output,
        HandlerRegistry::new(),
        InMemoryAssets::new(),
    );

    let resp = router.handle(get("https://example.com/page"));
    assert_eq!(resp.status, 500);
    assert_eq!(body_text(&resp), "Internal Server Error");
}

#[test]
fn test_handler_panic_is_contained() {
    let output = output(json!({
        "/page": { "type": "function", "entrypoint": "page.func" }
    }));
    let mut registry = HandlerRegistry::new();
    registry.register_fn("page.func", |_req, _scope| -> anyhow::Result<EdgeResponse> {
        panic!("handler blew up")
    });
    let router = router(
        routes(json!({ "version": 3, "routes": {} })),
        output,
        registry,
        InMemoryAssets::new(),
    );

    let resp = router.handle(get("https://example.com/page"));
    assert_eq!(resp.status, 500);
    assert_eq!(body_text(&resp), "Internal Server Error");
}

#[test]
fn test_override_entry_serves_artifact_with_headers() {
    let output = output(json!({
        "/favicon.ico": {
            "type": "override",
            "path": "/icons/favicon.ico",
            "headers": { "content-type": "image/x-icon" }
        }
    }));
    let assets = InMemoryAssets::new().with_text("/icons/favicon.ico", "icon-bytes");
    let router = router(
        routes(json!({ "version": 3, "routes": {} })),
        output,
        HandlerRegistry::new(),
        assets,
    );

    let resp = router.handle(get("https://example.com/favicon.ico"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("image/x-icon"));
    assert_eq!(body_text(&resp), "icon-bytes");
}

#[test]
fn test_manifest_overrides_are_folded_into_output() {
    let routes = routes(json!({
        "version": 3,
        "routes": {},
        "overrides": {
            "404.html": { "path": "404", "contentType": "text/html" }
        }
    }));
    let assets = InMemoryAssets::new().with_text("/404", "<h1>not found</h1>");
    let router = router(routes, output(json!({})), HandlerRegistry::new(), assets);

    let resp = router.handle(get("https://example.com/404.html"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("text/html"));
    assert_eq!(body_text(&resp), "<h1>not found</h1>");
}

#[test]
fn test_absolute_url_destination_fetches_upstream() {
    let routes = routes(json!({
        "version": 3,
        "routes": {
            "rewrite": [
                { "src": "^/api/(.*)$", "dest": "https://api.example.org/v1/$1" }
            ]
        }
    }));
    let assets =
        InMemoryAssets::new().with_text("https://api.example.org/v1/users", "upstream users");
    let router = router(routes, output(json!({})), HandlerRegistry::new(), assets);

    let resp = router.handle(get("https://example.com/api/users"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "upstream users");
}

#[test]
fn test_scope_writes_stay_per_request() {
    let output = output(json!({
        "/page": { "type": "function", "entrypoint": "page.func" }
    }));
    let mut registry = HandlerRegistry::new();
    registry.register_fn("page.func", |_req, scope| {
        let body = if scope.get("visited").is_some() { "leaked" } else { "fresh" };
        scope.set("visited", serde_json::json!(true));
        Ok(EdgeResponse::text(200, body))
    });
    let router = router(
        routes(json!({ "version": 3, "routes": {} })),
        output,
        registry,
        InMemoryAssets::new(),
    );

    assert_eq!(body_text(&router.handle(get("https://example.com/page"))), "fresh");
    assert_eq!(body_text(&router.handle(get("https://example.com/page"))), "fresh");
}

#[test]
fn test_redirect_to_matched_path_keeps_query() {
    let routes = routes(json!({
        "version": 3,
        "routes": {
            "none": [
                { "src": "^/landing$", "headers": { "location": "/landing" }, "status": 307 }
            ]
        }
    }));
    let router =
        router(routes, output(json!({})), HandlerRegistry::new(), InMemoryAssets::new());

    let resp = router.handle(get("https://example.com/landing?utm=mail"));
    assert_eq!(resp.status, 307);
    assert_eq!(resp.get_header("location"), Some("/landing?utm=mail"));
}
