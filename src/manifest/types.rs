use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One ordered stage of the routing pipeline.
///
/// Every phase owns its own rule list in the build manifest. `Hit` and `Error`
/// are terminal for the default chain; any rule may force a transition via its
/// `check` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    None,
    Filesystem,
    Rewrite,
    Resource,
    Miss,
    Hit,
    Error,
}

impl Phase {
    /// The fixed default successor of this phase.
    ///
    /// `none → filesystem → rewrite → resource → miss`; everything at or past
    /// `miss` falls back to `miss` again.
    #[must_use]
    pub fn next(self) -> Phase {
        match self {
            Phase::None => Phase::Filesystem,
            Phase::Filesystem => Phase::Rewrite,
            Phase::Rewrite => Phase::Resource,
            Phase::Resource => Phase::Miss,
            Phase::Miss | Phase::Hit | Phase::Error => Phase::Miss,
        }
    }

    /// All phases in manifest order.
    pub const ALL: [Phase; 7] = [
        Phase::None,
        Phase::Filesystem,
        Phase::Rewrite,
        Phase::Resource,
        Phase::Miss,
        Phase::Hit,
        Phase::Error,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::None => "none",
            Phase::Filesystem => "filesystem",
            Phase::Rewrite => "rewrite",
            Phase::Resource => "resource",
            Phase::Miss => "miss",
            Phase::Hit => "hit",
            Phase::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One `has`/`missing` clause of a route rule.
///
/// Each variant names the request surface it reads. A missing `value` means the
/// clause only checks presence (for `has`) or absence (for `missing`); a present
/// `value` is a pattern matched via the pattern compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteCondition {
    Host {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Header {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Cookie {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Query {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl RouteCondition {
    /// The pattern carried by this clause, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            RouteCondition::Host { value }
            | RouteCondition::Header { value, .. }
            | RouteCondition::Cookie { value, .. }
            | RouteCondition::Query { value, .. } => value.as_deref(),
        }
    }
}

/// Locale handling attached to a rule: redirect targets keyed by locale code
/// plus the cookie that carries the visitor's preference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocaleRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

/// One declarative match/transform instruction within a phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Source pattern, possibly delimited and carrying flag letters.
    pub src: String,
    /// HTTP methods this rule applies to; absent means all methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
    /// Conditions that must all hold for the rule to apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has: Vec<RouteCondition>,
    /// Conditions that must all be absent for the rule to apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<RouteCondition>,
    /// Destination template expanded against the match captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Headers to merge in; values may themselves be templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Keep scanning subsequent rules in the phase after this one applies.
    #[serde(default, rename = "continue")]
    pub continue_: bool,
    /// Re-enter the phase machine after this rule applies.
    #[serde(default)]
    pub check: bool,
    /// Headers merged by this rule win over later "normal" headers.
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Middleware bound to this rule, keyed into the handler registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware_path: Option<String>,
    /// Reset accumulated status/headers before applying this rule.
    #[serde(default, rename = "override")]
    pub override_: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<LocaleRule>,
}

impl RouteRule {
    /// Whether the rule's method list admits `method`. An absent list admits all.
    #[must_use]
    pub fn allows_method(&self, method: &Method) -> bool {
        match &self.methods {
            None => true,
            Some(methods) => methods.iter().any(|m| m.eq_ignore_ascii_case(method.as_str())),
        }
    }
}

/// A static-file override descriptor from the build manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// The declarative build manifest: ordered rule lists per phase plus literal
/// static-file overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutesManifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub routes: BTreeMap<Phase, Vec<RouteRule>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, OverrideEntry>,
}

impl RoutesManifest {
    /// The rules of one phase, empty when the manifest omits the phase.
    #[must_use]
    pub fn phase_rules(&self, phase: Phase) -> &[RouteRule] {
        self.routes.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locale codes known to this manifest, collected from every rule's
    /// `locale.redirect` keys in manifest order, deduplicated.
    #[must_use]
    pub fn collect_locales(&self) -> Vec<String> {
        let mut locales = Vec::new();
        for phase in Phase::ALL {
            for rule in self.phase_rules(phase) {
                let Some(redirects) = rule.locale.as_ref().and_then(|l| l.redirect.as_ref()) else {
                    continue;
                };
                for code in redirects.keys() {
                    if !locales.iter().any(|l| l == code) {
                        locales.push(code.clone());
                    }
                }
            }
        }
        locales
    }
}

/// Terminal artifact descriptor that answers a fully-resolved path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputEntry {
    /// Dynamically-invoked handler.
    Function { entrypoint: String },
    /// Middleware handler; invoked during phase processing, never as a terminal.
    Middleware { entrypoint: String },
    /// Pre-rendered artifact served from the asset store with extra headers.
    Override {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<BTreeMap<String, String>>,
    },
    /// Pass-through to the static asset store.
    Static,
}

/// The output manifest: resolved path → artifact descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputManifest {
    pub entries: HashMap<String, OutputEntry>,
}

impl OutputManifest {
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&OutputEntry> {
        self.entries.get(path)
    }

    /// Whether `path` resolves to a known output artifact.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}
