//! Build request preparation.
//!
//! Orchestrates resolution and validation into a [`BuildPlan`]: index
//! images are digest-pinned and their metadata read under a scoped
//! registry credential, arches are gathered and checked against the
//! binary image, the distribution scope is validated and bundles are
//! grouped by operator package. The steps run strictly in sequence;
//! each depends on the previous one's results. Any failure aborts the
//! whole preparation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use forge_core::error::Result;
use forge_core::WorkerConfig;

use crate::arch;
use crate::auth;
use crate::cache::MemoryStore;
use crate::exec::ProcessRunner;
use crate::inspect::ImageInspector;
use crate::request::{
    BuildPlan, IndexImageInfo, IndexRole, RequestConfig, ResolvedIndexes,
    DEFAULT_OCP_VERSION, DELIVERY_VERSION_LABEL, DISTRIBUTION_SCOPE_LABEL, BUNDLE_PACKAGE_LABEL,
};
use crate::retry::RetryPolicy;
use crate::scope;

/// Prepares build requests into [`BuildPlan`]s.
pub struct RequestPreparer {
    inspector: ImageInspector,
    auth_file: PathBuf,
}

impl RequestPreparer {
    pub fn new(inspector: ImageInspector, auth_file: PathBuf) -> Self {
        Self {
            inspector,
            auth_file,
        }
    }

    /// A preparer wired to the real inspection tool, per the worker
    /// configuration.
    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        let inspector = ImageInspector::new(
            Arc::new(ProcessRunner::new()),
            Arc::new(MemoryStore::new()),
            RetryPolicy::new(config.total_attempts),
            config.skopeo_timeout.clone(),
        );
        Self::new(inspector, config.registry_auth_file.clone())
    }

    pub fn inspector(&self) -> &ImageInspector {
        &self.inspector
    }

    /// Prepare the request for the index image build.
    pub fn prepare(&self, request_id: u64, config: &RequestConfig) -> Result<BuildPlan> {
        tracing::info!(request_id, "Resolving the container images");

        let indexes = self.resolve_indexes(config)?;
        let arches = arch::gather_request_arches(config, &indexes)?;
        tracing::debug!(
            arches = %arches.iter().cloned().collect::<Vec<_>>().join(", "),
            "Set to build the index image for the following arches"
        );

        // Add and remove requests validate against the scope of the index
        // they build from; merge requests validate against the index
        // being overwritten.
        let resolved_scope = match config {
            RequestConfig::AddRm(_) => indexes.from_index.resolved_distribution_scope,
            RequestConfig::Merge(_) => indexes.target_index.resolved_distribution_scope,
        };
        let distribution_scope =
            scope::validate_distribution_scope(resolved_scope, config.distribution_scope())?;

        let binary_image = config.binary_image_for(&indexes.from_index, distribution_scope)?;
        let binary_image_resolved = self.inspector.resolve_digest(&binary_image)?;
        let binary_image_arches = arch::image_arches(&self.inspector, &binary_image_resolved)?;
        arch::ensure_arches_available(&arches, &binary_image_arches)?;

        let mut bundle_mapping: HashMap<String, Vec<String>> = HashMap::new();
        for bundle in config.bundles() {
            let operator = self.inspector.image_label(bundle, BUNDLE_PACKAGE_LABEL)?;
            // Unlabeled bundles are left out of the mapping, not rejected
            if let Some(operator) = operator.filter(|o| !o.is_empty()) {
                bundle_mapping.entry(operator).or_default().push(bundle.clone());
            }
        }

        Ok(BuildPlan {
            arches,
            binary_image,
            binary_image_resolved,
            bundle_mapping,
            from_index_resolved: indexes.from_index.resolved_pull_spec,
            ocp_version: indexes.from_index.ocp_version,
            distribution_scope,
            source_from_index_resolved: indexes.source_from_index.resolved_pull_spec,
            source_ocp_version: indexes.source_from_index.ocp_version,
            target_index_resolved: indexes.target_index.resolved_pull_spec,
            target_ocp_version: indexes.target_index.ocp_version,
        })
    }

    fn resolve_indexes(&self, config: &RequestConfig) -> Result<ResolvedIndexes> {
        Ok(ResolvedIndexes {
            from_index: self.index_info(config, IndexRole::FromIndex)?,
            source_from_index: self.index_info(config, IndexRole::SourceFromIndex)?,
            target_index: self.index_info(config, IndexRole::TargetIndex)?,
        })
    }

    /// Resolve one index role's metadata.
    ///
    /// An absent index yields the role's defaults. Resolution runs with
    /// the variant's override token scoped to the index's registry.
    fn index_info(&self, config: &RequestConfig, role: IndexRole) -> Result<IndexImageInfo> {
        let mut info = IndexImageInfo::default_for(role);
        let Some(from_index) = config.index_ref(role) else {
            return Ok(info);
        };

        let mut guard = auth::set_registry_token(
            &self.auth_file,
            config.override_token(),
            Some(from_index),
        )?;

        let result = (|| {
            let resolved = self.inspector.resolve_digest(from_index)?;
            info.arches = arch::image_arches(&self.inspector, &resolved)?;
            info.ocp_version = self
                .inspector
                .image_label(&resolved, DELIVERY_VERSION_LABEL)?
                .filter(|version| !version.is_empty())
                .unwrap_or_else(|| DEFAULT_OCP_VERSION.to_string());
            info.resolved_distribution_scope = match self
                .inspector
                .image_label(&resolved, DISTRIBUTION_SCOPE_LABEL)?
                .filter(|scope| !scope.is_empty())
            {
                Some(scope) => scope.parse()?,
                None => info.resolved_distribution_scope,
            };
            info.resolved_pull_spec = Some(resolved);
            Ok(info)
        })();

        guard.release()?;
        result
    }
}
