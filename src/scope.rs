//! Per-request isolation of runtime bindings.
//!
//! Handlers and middleware may stash bindings in their execution context. A
//! small allow-list of keys (the active fetch override and the
//! incremental-cache handle) is genuinely process-wide; everything else must
//! stay invisible to concurrently-executing requests. Instead of proxying a
//! shared global namespace, bindings are ordinary per-request context values:
//! reads fall through to the shared runtime, writes land in a request-local
//! shadow unless the key is allow-listed. One shared runtime is kept per
//! isolation key (e.g. per middleware bundle) and reused across requests
//! sharing that key.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keys whose writes are process-wide rather than request-scoped.
pub const SHARED_KEYS: &[&str] = &["fetch", "incremental_cache"];

/// Process-wide binding slots shared by all requests under one isolation key.
#[derive(Debug, Default)]
pub struct SharedRuntime {
    slots: Mutex<HashMap<String, Value>>,
}

impl SharedRuntime {
    fn get(&self, key: &str) -> Option<Value> {
        self.slots.lock().expect("shared runtime lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.slots
            .lock()
            .expect("shared runtime lock poisoned")
            .insert(key.to_string(), value);
    }
}

/// Execution context handed to handlers: request-local shadow bindings over a
/// shared runtime.
#[derive(Debug)]
pub struct RequestScope {
    shared: Arc<SharedRuntime>,
    shadow: Mutex<HashMap<String, Value>>,
}

impl RequestScope {
    pub fn new(shared: Arc<SharedRuntime>) -> Self {
        Self { shared, shadow: Mutex::new(HashMap::new()) }
    }

    /// Read a binding: the request-local shadow wins, then the shared runtime.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.shadow.lock().expect("scope lock poisoned").get(key) {
            return Some(value.clone());
        }
        self.shared.get(key)
    }

    /// Write a binding: allow-listed keys go to the shared runtime, everything
    /// else to the request-local shadow.
    pub fn set(&self, key: &str, value: Value) {
        if SHARED_KEYS.contains(&key) {
            self.shared.set(key, value);
        } else {
            self.shadow
                .lock()
                .expect("scope lock poisoned")
                .insert(key.to_string(), value);
        }
    }
}

/// Shared runtimes cached per isolation key.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    runtimes: Mutex<HashMap<String, Arc<SharedRuntime>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh request scope over the shared runtime for `isolation_key`,
    /// creating and caching the runtime on first use.
    #[must_use]
    pub fn scope_for(&self, isolation_key: &str) -> RequestScope {
        let shared = Arc::clone(
            self.runtimes
                .lock()
                .expect("scope registry lock poisoned")
                .entry(isolation_key.to_string())
                .or_default(),
        );
        RequestScope::new(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_writes_do_not_leak() {
        let registry = ScopeRegistry::new();
        let a = registry.scope_for("mw");
        let b = registry.scope_for("mw");
        a.set("user", json!("alice"));
        assert_eq!(a.get("user"), Some(json!("alice")));
        assert_eq!(b.get("user"), None);
    }

    #[test]
    fn test_shared_keys_are_process_wide() {
        let registry = ScopeRegistry::new();
        let a = registry.scope_for("mw");
        a.set("incremental_cache", json!({"handle": 1}));
        let b = registry.scope_for("mw");
        assert_eq!(b.get("incremental_cache"), Some(json!({"handle": 1})));
    }

    #[test]
    fn test_isolation_keys_are_independent() {
        let registry = ScopeRegistry::new();
        let a = registry.scope_for("bundle-a");
        a.set("fetch", json!("patched"));
        let b = registry.scope_for("bundle-b");
        assert_eq!(b.get("fetch"), None);
    }

    #[test]
    fn test_shadow_wins_over_shared() {
        let registry = ScopeRegistry::new();
        let scope = registry.scope_for("mw");
        scope.set("fetch", json!("global"));
        scope.set("flag", json!(1));
        assert_eq!(scope.get("fetch"), Some(json!("global")));
        assert_eq!(scope.get("flag"), Some(json!(1)));
    }
}
