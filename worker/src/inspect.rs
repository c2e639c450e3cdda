//! Image metadata inspection.
//!
//! Wraps the external `skopeo inspect` tool behind retry and caching to
//! expose raw manifests, image configs and digest resolution. All
//! operations block on the child process; retry is synchronous and the
//! cache only serves digest-pinned references.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use forge_core::error::{ForgeError, Result};

use crate::cache::{cache_key, should_cache_inspect, with_cache, CacheStore};
use crate::exec::{CommandRunner, RunOptions};
use crate::reference;
use crate::retry::{with_retry, RetryPolicy};

/// Media type of a v2 manifest list.
pub const MEDIA_TYPE_MANIFEST_LIST_V2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// Media type of a v2 schema 2 image manifest.
pub const MEDIA_TYPE_MANIFEST_V2: &str =
    "application/vnd.docker.distribution.manifest.v2+json";

/// A raw manifest as returned by the inspection tool.
///
/// `text` keeps the exact bytes so digests can be computed over them.
#[derive(Debug, Clone)]
pub struct RawManifest {
    pub text: String,
    pub value: Value,
}

impl RawManifest {
    pub fn media_type(&self) -> Option<&str> {
        self.value.get("mediaType").and_then(Value::as_str)
    }

    pub fn schema_version(&self) -> Option<u64> {
        self.value.get("schemaVersion").and_then(Value::as_u64)
    }
}

/// Inspects image metadata through the external tool.
pub struct ImageInspector {
    runner: Arc<dyn CommandRunner>,
    cache: Arc<dyn CacheStore>,
    retry: RetryPolicy,
    command_timeout: String,
}

impl ImageInspector {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cache: Arc<dyn CacheStore>,
        retry: RetryPolicy,
        command_timeout: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            cache,
            retry,
            command_timeout: command_timeout.into(),
        }
    }

    /// Inspect the raw manifest of an image.
    ///
    /// With `require_media_type`, a manifest without a `mediaType`
    /// field is rejected.
    pub fn inspect_raw(&self, pull_spec: &str, require_media_type: bool) -> Result<RawManifest> {
        let args = vec![docker_ref(pull_spec), "--raw".to_string()];
        self.invoke(&args, |text| {
            let value: Value = serde_json::from_str(&text)?;
            let manifest = RawManifest { text, value };
            if require_media_type && manifest.media_type().map_or(true, str::is_empty) {
                return Err(ForgeError::Inspect("mediaType not found".to_string()));
            }
            Ok(manifest)
        })
    }

    /// Inspect the image config document.
    pub fn inspect_config(&self, pull_spec: &str) -> Result<Value> {
        let args = vec![docker_ref(pull_spec), "--config".to_string()];
        self.invoke(&args, |text| Ok(serde_json::from_str::<Value>(&text)?))
    }

    /// The labels of an image, from `config.Labels` of its config.
    pub fn image_labels(&self, pull_spec: &str) -> Result<HashMap<String, String>> {
        tracing::debug!(pull_spec = %pull_spec, "Getting the labels");
        let config = self.inspect_config(pull_spec)?;
        let labels = config
            .get("config")
            .and_then(|c| c.get("Labels"))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(labels)
    }

    /// A single label of an image, or `None` when unset.
    pub fn image_label(&self, pull_spec: &str, label: &str) -> Result<Option<String>> {
        tracing::debug!(pull_spec = %pull_spec, label = %label, "Getting the label");
        let mut labels = self.image_labels(pull_spec)?;
        Ok(labels.remove(label))
    }

    /// Resolve a pull spec to its digest-pinned form.
    pub fn resolve_digest(&self, pull_spec: &str) -> Result<String> {
        tracing::debug!(pull_spec = %pull_spec, "Resolving");
        let name = reference::image_name(pull_spec);
        let raw = self.inspect_raw(pull_spec, false)?;
        let digest = if raw.schema_version() == Some(2) {
            format!("sha256:{}", hex::encode(Sha256::digest(raw.text.as_bytes())))
        } else {
            // Schema 1 manifests are not byte-stable between requests, so
            // the tool's own digest is trusted instead of hashing raw bytes.
            let inspected = self.inspect_full(pull_spec)?;
            inspected
                .get("Digest")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ForgeError::Inspect(format!(
                        "Digest not found in the inspection of {}",
                        pull_spec
                    ))
                })?
        };
        let resolved = format!("{}@{}", name, digest);
        tracing::debug!(pull_spec = %pull_spec, resolved = %resolved, "Resolved");
        Ok(resolved)
    }

    /// Resolve a bundle pull spec to its digest-pinned form.
    ///
    /// A manifest list is pinned to the digest of its first entry; the
    /// referenced platform manifest is not resolved further. A v2
    /// schema 2 manifest resolves like any other image.
    pub fn resolve_bundle_digest(&self, pull_spec: &str) -> Result<String> {
        let raw = self.inspect_raw(pull_spec, true)?;
        match raw.media_type() {
            Some(MEDIA_TYPE_MANIFEST_LIST_V2) => {
                let digest = raw
                    .value
                    .get("manifests")
                    .and_then(Value::as_array)
                    .and_then(|manifests| manifests.first())
                    .and_then(|manifest| manifest.get("digest"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ForgeError::Inspect(format!(
                            "The manifest list of {} has no manifests",
                            pull_spec
                        ))
                    })?;
                Ok(format!("{}@{}", reference::image_name(pull_spec), digest))
            }
            Some(MEDIA_TYPE_MANIFEST_V2) if raw.schema_version() == Some(2) => {
                self.resolve_digest(pull_spec)
            }
            media_type => Err(ForgeError::Validation(format!(
                "The pull specification of {} is neither a v2 manifest list nor a v2s2 \
                 manifest. Type {} and schema version {} is not supported.",
                pull_spec,
                media_type.unwrap_or("unknown"),
                raw.schema_version()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ))),
        }
    }

    /// Full (non-raw) inspection, used where the tool's own digest
    /// computation is needed.
    fn inspect_full(&self, pull_spec: &str) -> Result<Value> {
        let args = vec![docker_ref(pull_spec)];
        self.invoke(&args, |text| Ok(serde_json::from_str::<Value>(&text)?))
    }

    /// Run one inspection command with retry outside the cache.
    ///
    /// `post` runs inside the cached section: only output it accepts is
    /// stored, and a failed attempt is never stored, so the next
    /// attempt re-invokes the tool. `post` failures count as inspection
    /// failures when they raise the `Inspect` class.
    fn invoke<T>(&self, args: &[String], post: impl Fn(String) -> Result<T>) -> Result<T> {
        let mut cmd = vec![
            "skopeo".to_string(),
            "--command-timeout".to_string(),
            self.command_timeout.clone(),
            "inspect".to_string(),
        ];
        cmd.extend_from_slice(args);

        let context = args
            .iter()
            .find(|arg| arg.starts_with("docker://"))
            .map(|arg| format!("Failed to inspect {}. Make sure it exists and is accessible.", arg));
        let key = cache_key(&cmd);
        let eligible = should_cache_inspect(args);

        with_retry(&self.retry, ForgeError::is_inspect_failure, || {
            with_cache(
                &*self.cache,
                &key,
                eligible,
                || {
                    let opts = RunOptions {
                        cwd: None,
                        failure_context: context.clone(),
                    };
                    self.runner.run(&cmd, &opts).map_err(|err| match err {
                        ForgeError::Command(message) => ForgeError::Inspect(message),
                        other => other,
                    })
                },
                &post,
            )
        })
    }
}

fn docker_ref(pull_spec: &str) -> String {
    if pull_spec.starts_with("docker://") {
        pull_spec.to_string()
    } else {
        format!("docker://{}", pull_spec)
    }
}
