use anyhow::{anyhow, Result};
use edge_router::{
    AssetStore, EdgeRequest, EdgeResponse, EdgeRouter, HandlerRegistry, OutputManifest,
    RoutesManifest,
};
use http::Method;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary; later calls are no-ops.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Asset store backed by a map from path (or full URL) to canned response.
/// Records every fetched URL for assertions.
#[derive(Default)]
pub struct InMemoryAssets {
    files: HashMap<String, EdgeResponse>,
    pub fetched: Mutex<Vec<String>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, body: &str) -> Self {
        self.files.insert(key.to_string(), EdgeResponse::with_body(200, body.as_bytes()));
        self
    }

    pub fn with_response(mut self, key: &str, resp: EdgeResponse) -> Self {
        self.files.insert(key.to_string(), resp);
        self
    }
}

impl AssetStore for InMemoryAssets {
    fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse> {
        self.fetched.lock().unwrap().push(request.url.to_string());
        if let Some(resp) = self.files.get(request.url.as_str()) {
            return Ok(resp.clone());
        }
        self.files
            .get(request.url.path())
            .cloned()
            .ok_or_else(|| anyhow!("no asset at {}", request.url.path()))
    }
}

pub fn routes(value: serde_json::Value) -> RoutesManifest {
    edge_router::manifest::routes_manifest_from_str(&value.to_string()).unwrap()
}

pub fn output(value: serde_json::Value) -> OutputManifest {
    edge_router::manifest::output_manifest_from_str(&value.to_string()).unwrap()
}

pub fn router(
    routes_manifest: RoutesManifest,
    output_manifest: OutputManifest,
    registry: HandlerRegistry,
    assets: InMemoryAssets,
) -> EdgeRouter {
    init_tracing();
    EdgeRouter::new(routes_manifest, output_manifest, registry, Arc::new(assets))
}

pub fn get(url: &str) -> EdgeRequest {
    EdgeRequest::new(Method::GET, url.parse().unwrap())
}

pub fn get_with_headers(url: &str, headers: &[(&str, &str)]) -> EdgeRequest {
    let mut request = get(url);
    for (name, value) in headers {
        request.headers.insert(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
    }
    request
}

pub fn body_text(resp: &EdgeResponse) -> String {
    String::from_utf8(resp.body.clone()).unwrap()
}
