use super::compile::CompiledPattern;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum capture groups before heap allocation. Route sources rarely carry
/// more than a handful of captures.
pub const MAX_INLINE_GROUPS: usize = 8;

/// Stack-allocated capture storage for the match hot path.
///
/// Index 0 is the whole match; indices 1.. are the capture ordinals. `None`
/// marks a group that participated in no match (e.g. an unused alternation
/// branch).
pub type GroupVec = SmallVec<[Option<String>; MAX_INLINE_GROUPS]>;

/// Result of applying a [`CompiledPattern`] to an input string.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Raw group array; `groups[0]` is the whole match.
    pub groups: GroupVec,
    /// Capture ordinal -> name table shared with the compiled pattern
    /// (`Arc` clone, no copy).
    pub keys: Arc<[Option<String>]>,
}

impl PatternMatch {
    /// Look up a capture by name.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&str> {
        let idx = self
            .keys
            .iter()
            .position(|k| k.as_deref() == Some(name))?;
        self.groups.get(idx + 1)?.as_deref()
    }
}

impl CompiledPattern {
    /// Apply the pattern to `input`.
    ///
    /// Anchoring is exactly what the pattern encodes; the compiler never forces
    /// `^`/`$`, callers anchor via the manifest's own patterns.
    #[must_use]
    pub fn matches(&self, input: &str) -> Option<PatternMatch> {
        let caps = self.regex().captures(input)?;
        let groups: GroupVec = caps
            .iter()
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        Some(PatternMatch { groups, keys: Arc::clone(self.keys()) })
    }
}

/// Compile `source` with the given case sensitivity and match it against
/// `input` in one step. Returns `None` both on compile failure and on no
/// match; patterns are validated at manifest load, so a compile failure here
/// means the caller bypassed the loader.
#[must_use]
pub fn match_pcre(source: &str, input: &str, case_sensitive: bool) -> Option<PatternMatch> {
    let pattern = match CompiledPattern::new(source, case_sensitive) {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(source = %source, error = %err, "unvalidated pattern failed to compile");
            return None;
        }
    };
    pattern.matches(input)
}
