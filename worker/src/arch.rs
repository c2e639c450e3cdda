//! Architecture set computation.
//!
//! Determines the arches an image was built for and checks the subset
//! relationship between the arches a request needs and the arches the
//! binary image provides.

use std::collections::BTreeSet;

use serde_json::Value;

use forge_core::error::{ForgeError, Result};

use crate::inspect::{ImageInspector, MEDIA_TYPE_MANIFEST_LIST_V2, MEDIA_TYPE_MANIFEST_V2};
use crate::request::{RequestConfig, ResolvedIndexes};

/// The architectures an image was built for.
///
/// A manifest list yields the platform architecture of every entry; a
/// single v2 manifest yields the one architecture of its config.
pub fn image_arches(inspector: &ImageInspector, pull_spec: &str) -> Result<BTreeSet<String>> {
    tracing::debug!(pull_spec = %pull_spec, "Getting the available arches");
    let raw = inspector.inspect_raw(pull_spec, false)?;
    let mut arches = BTreeSet::new();
    match raw.media_type() {
        Some(MEDIA_TYPE_MANIFEST_LIST_V2) => {
            let manifests = raw
                .value
                .get("manifests")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for manifest in &manifests {
                let arch = manifest
                    .get("platform")
                    .and_then(|p| p.get("architecture"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ForgeError::Inspect(format!(
                            "The manifest list of {} has an entry without a platform architecture",
                            pull_spec
                        ))
                    })?;
                arches.insert(arch.to_string());
            }
        }
        Some(MEDIA_TYPE_MANIFEST_V2) => {
            let config = inspector.inspect_config(pull_spec)?;
            let arch = config
                .get("architecture")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ForgeError::Inspect(format!(
                        "architecture not found in the config of {}",
                        pull_spec
                    ))
                })?;
            arches.insert(arch.to_string());
        }
        _ => {
            return Err(ForgeError::Validation(format!(
                "The pull specification of {} is neither a v2 manifest list nor a v2 manifest",
                pull_spec
            )))
        }
    }
    Ok(arches)
}

/// The full architecture set a request asks for.
///
/// The union of the variant's extra arches and the arches of every
/// resolved index. An empty union means nothing constrains the build
/// and the request is rejected.
pub fn gather_request_arches(
    config: &RequestConfig,
    indexes: &ResolvedIndexes,
) -> Result<BTreeSet<String>> {
    let mut arches: BTreeSet<String> = config
        .add_arches()
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    for info in indexes.iter() {
        arches.extend(info.arches.iter().cloned());
    }

    if arches.is_empty() {
        return Err(ForgeError::Validation(
            "No arches were provided to build the index image".to_string(),
        ));
    }
    Ok(arches)
}

/// Require every requested arch to be available.
///
/// The failure names exactly the missing arches, sorted.
pub fn ensure_arches_available(
    requested: &BTreeSet<String>,
    available: &BTreeSet<String>,
) -> Result<()> {
    let missing: Vec<&str> = requested
        .difference(available)
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ForgeError::Validation(format!(
            "The binary image is not available for the following arches: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
