//! # Manifest Module
//!
//! Strongly-typed model of the two declarative inputs the router consumes:
//!
//! - the **routes manifest**: ordered [`RouteRule`] lists per [`Phase`], plus
//!   literal static-file overrides, and
//! - the **output manifest**: a map from fully-resolved path to the
//!   [`OutputEntry`] artifact that answers it.
//!
//! Loading is fail-fast: every rule source pattern and every condition pattern
//! is compiled while the manifest is parsed, so a malformed pattern is a fatal
//! configuration error at startup rather than a latent per-request fault.
//! Conditions are a tagged union per kind (`host`/`header`/`cookie`/`query`),
//! which also moves unknown-type mistakes to load time.

mod load;
mod types;

pub use load::{
    compile_route_patterns, load_output_manifest, load_routes_manifest, output_manifest_from_str,
    routes_manifest_from_str,
};
pub use types::{
    LocaleRule, OutputEntry, OutputManifest, OverrideEntry, Phase, RouteCondition, RouteRule,
    RoutesManifest,
};
