use super::types::{OutputManifest, RoutesManifest};
use crate::pattern::PatternCache;
use anyhow::Context;

/// Load and validate a build routes manifest from a JSON file.
pub fn load_routes_manifest(file_path: &str) -> anyhow::Result<RoutesManifest> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read routes manifest at {file_path}"))?;
    routes_manifest_from_str(&content)
}

/// Parse and validate a build routes manifest from a JSON string.
///
/// Validation eagerly compiles every rule source pattern and every condition
/// pattern so that malformed patterns are a fatal configuration error here,
/// never a per-request error.
pub fn routes_manifest_from_str(content: &str) -> anyhow::Result<RoutesManifest> {
    let manifest: RoutesManifest =
        serde_json::from_str(content).context("failed to parse routes manifest")?;
    compile_route_patterns(&manifest)?;
    Ok(manifest)
}

/// Load an output manifest (resolved path -> artifact descriptor) from a JSON file.
pub fn load_output_manifest(file_path: &str) -> anyhow::Result<OutputManifest> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read output manifest at {file_path}"))?;
    output_manifest_from_str(&content)
}

/// Parse an output manifest from a JSON string.
pub fn output_manifest_from_str(content: &str) -> anyhow::Result<OutputManifest> {
    serde_json::from_str(content).context("failed to parse output manifest")
}

/// Compile every rule source pattern and every condition pattern in the
/// manifest into a [`PatternCache`]. Malformed patterns are fatal here, with
/// the offending phase and rule index in the error.
///
/// The loaders call this for validation; [`crate::EdgeRouter`] calls it once
/// at construction and keeps the cache so per-request matching never
/// recompiles a source.
pub fn compile_route_patterns(manifest: &RoutesManifest) -> anyhow::Result<PatternCache> {
    let mut cache = PatternCache::new();
    for (phase, rules) in &manifest.routes {
        for (idx, rule) in rules.iter().enumerate() {
            cache.insert(&rule.src, rule.case_sensitive).with_context(|| {
                format!("invalid source pattern in phase `{phase}` rule {idx}: `{}`", rule.src)
            })?;
            for cond in rule.has.iter().chain(rule.missing.iter()) {
                if let Some(value) = cond.value() {
                    cache.insert(value, true).with_context(|| {
                        format!("invalid condition pattern in phase `{phase}` rule {idx}: `{value}`")
                    })?;
                }
            }
        }
    }
    Ok(cache)
}
