use super::compile::CompiledPattern;
use super::matcher::{match_pcre, PatternMatch};
use std::collections::HashMap;

/// Compiled patterns keyed by source text, split by case sensitivity.
///
/// Built once when a router is assembled so per-request matching reuses each
/// compilation instead of recompiling rule sources on every phase entry. A
/// source absent from the cache (e.g. a loosened miss-phase variant) falls
/// back to on-the-fly compilation.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    sensitive: HashMap<String, CompiledPattern>,
    insensitive: HashMap<String, CompiledPattern>,
}

impl PatternCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, case_sensitive: bool) -> &HashMap<String, CompiledPattern> {
        if case_sensitive {
            &self.sensitive
        } else {
            &self.insensitive
        }
    }

    /// Compile `source` and store it, unless it is already cached.
    pub fn insert(&mut self, source: &str, case_sensitive: bool) -> anyhow::Result<()> {
        let table = if case_sensitive { &mut self.sensitive } else { &mut self.insensitive };
        if !table.contains_key(source) {
            table.insert(source.to_string(), CompiledPattern::new(source, case_sensitive)?);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, source: &str, case_sensitive: bool) -> Option<&CompiledPattern> {
        self.table(case_sensitive).get(source)
    }

    /// Match `source` against `input`, reusing the cached compilation when
    /// present and compiling on the fly otherwise.
    #[must_use]
    pub fn matches(&self, source: &str, input: &str, case_sensitive: bool) -> Option<PatternMatch> {
        match self.get(source, case_sensitive) {
            Some(pattern) => pattern.matches(input),
            None => match_pcre(source, input, case_sensitive),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sensitive.len() + self.insensitive.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensitive.is_empty() && self.insensitive.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_then_get_reuses_compilation() {
        let mut cache = PatternCache::new();
        cache.insert("^/blog/(.*)$", false).unwrap();
        assert!(cache.get("^/blog/(.*)$", false).is_some());
        // sensitivity is part of the key
        assert!(cache.get("^/blog/(.*)$", true).is_none());
        let m = cache.matches("^/blog/(.*)$", "/blog/x", false).unwrap();
        assert_eq!(m.groups[1].as_deref(), Some("x"));
    }

    #[test]
    fn test_uncached_source_still_matches() {
        let cache = PatternCache::new();
        assert!(cache.matches("^/a$", "/a", true).is_some());
        assert!(cache.matches("^/a$", "/b", true).is_none());
    }

    #[test]
    fn test_malformed_insert_is_an_error() {
        assert!(PatternCache::new().insert("([", true).is_err());
    }
}
