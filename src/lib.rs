//! # edge-router
//!
//! A request router for edge deployments driven entirely by a declarative
//! build manifest.
//!
//! ## Overview
//! The build step of a framework deployment emits two artifacts: a routes
//! manifest (ordered rule lists per routing phase) and an output manifest
//! (resolved path to artifact descriptor). This crate loads both, walks each
//! request through the phase machine, and dispatches the resolved terminal:
//! a registered handler, a static asset, an upstream fetch, or a plain
//! 404/500.
//!
//! ## Architecture
//! - [`manifest`]: typed manifests and their loaders
//! - [`pattern`]: the PCRE-dialect pattern compiler and matcher
//! - [`template`]: `$name` / `$1` destination substitution
//! - [`conditions`]: `has` / `missing` clause evaluation
//! - [`merge`]: header and query-parameter merge semantics
//! - [`pipeline`]: the phase-based matching state machine
//! - [`middleware`]: the middleware response protocol
//! - [`dispatcher`]: terminal dispatch and the [`EdgeRouter`] façade
//! - [`scope`]: per-request isolation of runtime bindings
//!
//! ## Example
//! ```no_run
//! use edge_router::{EdgeRequest, EdgeRouter, HandlerRegistry};
//! use edge_router::manifest::{load_output_manifest, load_routes_manifest};
//! # fn assets() -> std::sync::Arc<dyn edge_router::AssetStore> { unimplemented!() }
//!
//! # fn main() -> anyhow::Result<()> {
//! let routes = load_routes_manifest("config/routes.json")?;
//! let output = load_output_manifest("config/output.json")?;
//! let mut registry = HandlerRegistry::new();
//! registry.register_fn("functions/index.func", |_req, _scope| {
//!     Ok(edge_router::EdgeResponse::text(200, "hello"))
//! });
//! let router = EdgeRouter::new(routes, output, registry, assets());
//! let request = EdgeRequest::new(http::Method::GET, "https://example.com/".parse()?);
//! let response = router.handle(request);
//! # Ok(())
//! # }
//! ```

pub mod conditions;
pub mod dispatcher;
pub mod ids;
pub mod manifest;
pub mod merge;
pub mod middleware;
pub mod pattern;
pub mod pipeline;
pub mod request;
pub mod scope;
pub mod template;

pub use dispatcher::{AssetStore, EdgeRouter, Handler, HandlerRegistry};
pub use ids::RequestId;
pub use manifest::{OutputManifest, Phase, RouteRule, RoutesManifest};
pub use pipeline::{PhaseStatus, Pipeline, RequestContext};
pub use request::{EdgeRequest, EdgeResponse, GeoInfo};
pub use scope::{RequestScope, ScopeRegistry};
