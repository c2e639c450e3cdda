//! Bundle resolution and deprecation.
//!
//! Resolves bundle pull specs to digest-pinned references, verifies
//! required labels, filters against a deprecation list and drives the
//! index tool's deprecation command.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use forge_core::error::{ForgeError, Result};

use crate::auth;
use crate::exec::{CommandRunner, RunOptions};
use crate::inspect::ImageInspector;

/// Resolve every bundle to its digest-pinned form.
///
/// Duplicates resolving to the same digest are collapsed; the first
/// occurrence keeps its position.
pub fn resolve_bundles(inspector: &ImageInspector, bundles: &[String]) -> Result<Vec<String>> {
    tracing::info!(bundles = %bundles.join(", "), "Resolving bundles");
    let mut seen = BTreeSet::new();
    let mut resolved = Vec::new();
    for bundle in bundles {
        let pinned = inspector.resolve_bundle_digest(bundle)?;
        if seen.insert(pinned.clone()) {
            resolved.push(pinned);
        }
    }
    Ok(resolved)
}

/// The bundles that are to be deprecated, in their original order.
///
/// The deprecation list is resolved to digest-pinned form, but the
/// input bundles are matched by their raw pull spec against that
/// resolved set. A bundle supplied as a tag reference therefore never
/// matches, even when it resolves to a listed digest.
pub fn filter_deprecated(
    inspector: &ImageInspector,
    bundles: &[String],
    deprecation_list: &[String],
) -> Result<Vec<String>> {
    let resolved: BTreeSet<String> = resolve_bundles(inspector, deprecation_list)?
        .into_iter()
        .collect();
    let deprecate: Vec<String> = bundles
        .iter()
        .filter(|bundle| resolved.contains(*bundle))
        .cloned()
        .collect();

    tracing::info!(
        bundles = %deprecate.join(", "),
        "Bundles that will be deprecated from the index image"
    );
    Ok(deprecate)
}

/// Verify that every bundle carries every required label value.
pub fn verify_labels(
    inspector: &ImageInspector,
    bundles: &[String],
    required_labels: &HashMap<String, String>,
) -> Result<()> {
    if required_labels.is_empty() {
        return Ok(());
    }

    for bundle in bundles {
        let labels = inspector.image_labels(bundle)?;
        for (label, value) in required_labels {
            if labels.get(label) != Some(value) {
                return Err(ForgeError::Validation(format!(
                    "The bundle {} does not have the label {}={}",
                    bundle, label, value
                )));
            }
        }
    }
    Ok(())
}

/// Deprecate bundles from an index image.
///
/// Only the Dockerfile is generated; no build is performed. Runs under
/// a registry token scope for the index being modified.
#[allow(clippy::too_many_arguments)]
pub fn deprecate_bundles(
    runner: &dyn CommandRunner,
    auth_file: &Path,
    bundles: &[String],
    base_dir: &Path,
    binary_image: &str,
    from_index: &str,
    overwrite_target_index_token: Option<&str>,
    container_tool: Option<&str>,
) -> Result<()> {
    let mut cmd: Vec<String> = [
        "opm",
        "index",
        "deprecatetruncate",
        "--generate",
        "--binary-image",
        binary_image,
        "--from-index",
        from_index,
        "--bundles",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    cmd.push(bundles.join(","));
    if let Some(tool) = container_tool {
        cmd.push("--container-tool".to_string());
        cmd.push(tool.to_string());
    }

    let _guard =
        auth::set_registry_token(auth_file, overwrite_target_index_token, Some(from_index))?;
    runner.run(
        &cmd,
        &RunOptions {
            cwd: Some(base_dir.to_path_buf()),
            failure_context: Some("Failed to deprecate the bundles".to_string()),
        },
    )?;
    Ok(())
}
