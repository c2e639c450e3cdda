//! Memoization of expensive inspection calls.
//!
//! Inspection results are cached keyed by their effective command
//! signature. A policy predicate decides per call whether caching is
//! acceptable: only digest-pinned `docker://` references are immutable,
//! so only those are eligible. Floating tags can change between calls
//! and must always be re-inspected.

use std::collections::HashMap;

use parking_lot::Mutex;

use forge_core::error::Result;

/// Pluggable backing store for cached inspection output.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
}

/// In-process [`CacheStore`] with no eviction.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.entries.lock().insert(key.to_string(), value);
    }
}

/// Canonical cache key for a command invocation.
pub fn cache_key(cmd: &[String]) -> String {
    cmd.join(" ")
}

/// Whether an inspection of these arguments may be served from cache.
///
/// True only when some argument is a scheme-qualified reference pinned
/// by digest.
pub fn should_cache_inspect(args: &[String]) -> bool {
    args.iter()
        .any(|arg| arg.starts_with("docker://") && arg.contains("@sha256:"))
}

/// Run `op` through the cache, decoding its raw output with `decode`.
///
/// When `eligible`, a hit short-circuits `op` and is re-decoded. The
/// raw output is stored only after `decode` accepts it; a failure of
/// either step is never cached, so a later attempt re-invokes `op`.
pub fn with_cache<T, F, D>(
    store: &dyn CacheStore,
    key: &str,
    eligible: bool,
    op: F,
    decode: D,
) -> Result<T>
where
    F: FnOnce() -> Result<String>,
    D: Fn(String) -> Result<T>,
{
    if eligible {
        if let Some(hit) = store.get(key) {
            tracing::debug!(key = %key, "Inspection cache hit");
            return decode(hit);
        }
    }
    let value = op()?;
    let decoded = decode(value.clone())?;
    if eligible {
        store.put(key, value);
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::error::ForgeError;
    use std::cell::Cell;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_should_cache_digest_pinned_docker_ref() {
        assert!(should_cache_inspect(&args(&[
            "docker://quay.io/ns/repo@sha256:abc",
            "--raw"
        ])));
    }

    #[test]
    fn test_should_not_cache_tag_ref() {
        assert!(!should_cache_inspect(&args(&[
            "docker://quay.io/ns/repo:latest",
            "--raw"
        ])));
    }

    #[test]
    fn test_should_not_cache_without_scheme() {
        assert!(!should_cache_inspect(&args(&["quay.io/ns/repo@sha256:abc"])));
    }

    fn accept(value: String) -> Result<String> {
        Ok(value)
    }

    #[test]
    fn test_hit_short_circuits() {
        let store = MemoryStore::new();
        let calls = Cell::new(0);
        let op = || {
            calls.set(calls.get() + 1);
            Ok("value".to_string())
        };
        assert_eq!(with_cache(&store, "k", true, op, accept).unwrap(), "value");
        let op = || {
            calls.set(calls.get() + 1);
            Ok("other".to_string())
        };
        assert_eq!(with_cache(&store, "k", true, op, accept).unwrap(), "value");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_ineligible_bypasses_store() {
        let store = MemoryStore::new();
        assert_eq!(
            with_cache(&store, "k", false, || Ok("v1".to_string()), accept).unwrap(),
            "v1"
        );
        assert!(store.is_empty());
        assert_eq!(
            with_cache(&store, "k", false, || Ok("v2".to_string()), accept).unwrap(),
            "v2"
        );
    }

    #[test]
    fn test_failures_not_cached() {
        let store = MemoryStore::new();
        let result = with_cache(
            &store,
            "k",
            true,
            || Err(ForgeError::Inspect("boom".to_string())),
            accept,
        );
        assert!(result.is_err());
        assert!(store.is_empty());
        assert_eq!(
            with_cache(&store, "k", true, || Ok("recovered".to_string()), accept).unwrap(),
            "recovered"
        );
    }

    // Output the decoder rejects must not be stored either; a later
    // call gets a fresh invocation.
    #[test]
    fn test_rejected_output_not_cached() {
        let store = MemoryStore::new();
        let calls = Cell::new(0);
        let op = || {
            calls.set(calls.get() + 1);
            Ok("incomplete".to_string())
        };
        let reject =
            |_: String| -> Result<String> { Err(ForgeError::Inspect("mediaType not found".to_string())) };
        assert!(with_cache(&store, "k", true, op, reject).is_err());
        assert!(store.is_empty());

        let op = || {
            calls.set(calls.get() + 1);
            Ok("complete".to_string())
        };
        assert_eq!(with_cache(&store, "k", true, op, accept).unwrap(), "complete");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_cache_key_is_argument_order_sensitive() {
        assert_ne!(
            cache_key(&args(&["skopeo", "inspect", "a", "b"])),
            cache_key(&args(&["skopeo", "inspect", "b", "a"]))
        );
    }
}
