mod common;

use common::{body_text, get, get_with_headers, output, router, routes, InMemoryAssets};
use edge_router::HandlerRegistry;
use serde_json::json;

fn locale_routes() -> edge_router::RoutesManifest {
    routes(json!({
        "version": 3,
        "routes": {
            "none": [
                {
                    "src": "^/$",
                    "locale": {
                        "redirect": { "en": "/en", "fr": "/fr" },
                        "cookie": "NEXT_LOCALE"
                    },
                    "continue": true
                }
            ]
        }
    }))
}

fn locale_output() -> edge_router::OutputManifest {
    output(json!({
        "/": { "type": "static" },
        "/en": { "type": "static" },
        "/fr": { "type": "static" },
        "/about": { "type": "static" }
    }))
}

fn locale_assets() -> InMemoryAssets {
    InMemoryAssets::new()
        .with_text("/", "home")
        .with_text("/en", "english home")
        .with_text("/fr", "french home")
        .with_text("/about", "about page")
}

#[test]
fn test_locale_cookie_beats_accept_language() {
    let router = router(locale_routes(), locale_output(), HandlerRegistry::new(), locale_assets());

    let resp = router.handle(get_with_headers(
        "https://example.com/",
        &[("cookie", "NEXT_LOCALE=fr"), ("accept-language", "en;q=0.9")],
    ));
    assert_eq!(resp.status, 307);
    assert_eq!(resp.get_header("location"), Some("/fr"));
}

#[test]
fn test_accept_language_quality_ordering() {
    let router = router(locale_routes(), locale_output(), HandlerRegistry::new(), locale_assets());

    let resp = router.handle(get_with_headers(
        "https://example.com/",
        &[("accept-language", "en;q=0.5,fr;q=0.9")],
    ));
    assert_eq!(resp.status, 307);
    assert_eq!(resp.get_header("location"), Some("/fr"));
}

#[test]
fn test_no_preference_serves_page() {
    let router = router(locale_routes(), locale_output(), HandlerRegistry::new(), locale_assets());

    let resp = router.handle(get("https://example.com/"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "home");
    assert!(resp.get_header("location").is_none());
}

#[test]
fn test_unknown_preference_falls_through() {
    let router = router(locale_routes(), locale_output(), HandlerRegistry::new(), locale_assets());

    let resp = router.handle(get_with_headers(
        "https://example.com/",
        &[("accept-language", "de")],
    ));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "home");
}

#[test]
fn test_locale_prefix_stripped_for_known_output() {
    let router = router(locale_routes(), locale_output(), HandlerRegistry::new(), locale_assets());

    // /en/about is not an output itself, but /about is
    let resp = router.handle(get("https://example.com/en/about"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "about page");
}

#[test]
fn test_miss_phase_loosens_locale_alternation() {
    let routes = routes(json!({
        "version": 3,
        "routes": {
            "none": [
                {
                    "src": "^/__locale$",
                    "locale": { "redirect": { "en": "/en", "fr": "/fr" } },
                    "continue": true
                }
            ],
            "miss": [
                { "src": "^/(?:en|fr)/(.*)$", "dest": "/landing", "check": true }
            ]
        }
    }));
    let output = output(json!({ "/landing": { "type": "static" } }));
    let assets = InMemoryAssets::new().with_text("/landing", "landing");
    let router = router(routes, output, HandlerRegistry::new(), assets);

    // a bare locale path only matches the miss rule through its loosened form
    let resp = router.handle(get("https://example.com/en"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "landing");
}
