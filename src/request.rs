//! Inbound request / outbound response types shared by the pipeline, the
//! middleware processor, and the output dispatcher, plus the synthetic
//! geo-header convenience for downstream handlers.

use crate::ids::RequestId;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Host header used to address the auxiliary incremental-cache service.
/// Pass-through convenience for downstream handlers, not part of the core
/// routing contract.
pub const CACHE_SERVICE_HOST: &str = "suspense-cache.vercel-infra.com";

/// One inbound HTTP request as the router sees it.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub id: RequestId,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl EdgeRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Build a request from parts, adopting a valid `x-request-id` header when
    /// the caller already carries one, so log correlation spans hops.
    pub fn from_parts(method: Method, url: Url, headers: HeaderMap, body: Option<Vec<u8>>) -> Self {
        let id = RequestId::from_header_or_new(
            headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        );
        Self { id, method, url, headers, body }
    }

    /// Get a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A copy of this request re-addressed to `path` on the same host, used to
    /// fetch static/override artifacts for the original request.
    #[must_use]
    pub fn for_path(&self, path: &str) -> EdgeRequest {
        let mut url = self.url.clone();
        url.set_path(path);
        url.set_query(None);
        EdgeRequest {
            id: self.id,
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: None,
        }
    }
}

/// One outbound HTTP response.
#[derive(Debug, Clone, Default)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl EdgeResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: HeaderMap::new(), body: Vec::new() }
    }

    pub fn with_body(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// Plain-text response with the conventional reason phrase as body.
    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        let mut resp = Self::with_body(status, body.as_bytes().to_vec());
        resp.headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        resp
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.insert(name, value);
        }
    }
}

/// Whether `s` is an absolute URL rather than a path. Paths stay inside the
/// routing machine; absolute URLs are terminal destinations fetched upstream.
#[must_use]
pub fn is_url(s: &str) -> bool {
    Url::parse(s).is_ok()
}

/// Parse a `cookie` request header into name/value pairs, first occurrence
/// first. Called once per request at context construction.
#[must_use]
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    let Some(raw) = headers.get(http::header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return Vec::new();
    };
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Request geo metadata supplied by the hosting runtime.
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    pub continent: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub timezone: Option<String>,
}

/// Derive the synthetic `x-vercel-ip-*` request headers downstream geo-aware
/// handlers expect. The city is percent-encoded since it may carry non-ASCII
/// characters.
pub fn apply_geo_headers(headers: &mut HeaderMap, geo: &GeoInfo) {
    let mut set = |name: &'static str, value: Option<&String>| {
        if let Some(value) = value {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
    };
    let encoded_city = geo.city.as_ref().map(|c| urlencoding::encode(c).into_owned());
    set("x-vercel-ip-city", encoded_city.as_ref());
    set("x-vercel-ip-continent", geo.continent.as_ref());
    set("x-vercel-ip-country", geo.country.as_ref());
    set("x-vercel-ip-country-region", geo.region.as_ref());
    set("x-vercel-ip-latitude", geo.latitude.as_ref());
    set("x-vercel-ip-longitude", geo.longitude.as_ref());
    set("x-vercel-ip-timezone", geo.timezone.as_ref());
}
