//! Build request model.
//!
//! A request is one of two variants: add/remove against a single
//! `from_index`, or a merge of a source index into a target index.
//! Each variant carries only its own fields; nothing is defaulted
//! after construction.

use std::collections::{BTreeSet, HashMap};

use forge_core::error::{ForgeError, Result};

use crate::scope::DistributionScope;

/// Label carrying the ocp version an index image delivers for.
pub const DELIVERY_VERSION_LABEL: &str = "com.redhat.index.delivery.version";

/// Label carrying the distribution scope of an index image.
pub const DISTRIBUTION_SCOPE_LABEL: &str = "com.redhat.index.delivery.distribution_scope";

/// Label naming the operator package a bundle belongs to.
pub const BUNDLE_PACKAGE_LABEL: &str = "operators.operatorframework.io.bundle.package.v1";

/// Fallback ocp version when an index carries no delivery label.
pub const DEFAULT_OCP_VERSION: &str = "v4.5";

/// Binary image lookup table, keyed by distribution scope then ocp version.
pub type BinaryImageConfig = HashMap<String, HashMap<String, String>>;

/// Parameters of an add/remove build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddRmRequest {
    /// Explicit binary image, overriding the lookup table
    pub binary_image: Option<String>,
    /// Requested distribution scope
    pub distribution_scope: Option<DistributionScope>,
    /// Binary image lookup table
    pub binary_image_config: BinaryImageConfig,
    /// Token (`user:password`) for overwriting `from_index`
    pub overwrite_from_index_token: Option<String>,
    /// Base index to build from
    pub from_index: Option<String>,
    /// Arches to build in addition to those of `from_index`
    pub add_arches: BTreeSet<String>,
    /// Bundles to add, in request order
    pub bundles: Vec<String>,
    /// Operator package names to remove
    pub operators: Vec<String>,
}

/// Parameters of a merge build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Explicit binary image, overriding the lookup table
    pub binary_image: Option<String>,
    /// Requested distribution scope
    pub distribution_scope: Option<DistributionScope>,
    /// Binary image lookup table
    pub binary_image_config: BinaryImageConfig,
    /// Index used as the base of the merged index
    pub source_from_index: String,
    /// Index whose new data is added to the merged index
    pub target_index: String,
    /// Token (`user:password`) for overwriting `target_index`
    pub overwrite_target_index_token: Option<String>,
}

/// A build request, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestConfig {
    AddRm(AddRmRequest),
    Merge(MergeRequest),
}

impl RequestConfig {
    /// The requested distribution scope, if any.
    pub fn distribution_scope(&self) -> Option<DistributionScope> {
        match self {
            Self::AddRm(req) => req.distribution_scope,
            Self::Merge(req) => req.distribution_scope,
        }
    }

    /// The explicit binary image override, if any.
    pub fn binary_image_override(&self) -> Option<&str> {
        match self {
            Self::AddRm(req) => req.binary_image.as_deref(),
            Self::Merge(req) => req.binary_image.as_deref(),
        }
    }

    pub fn binary_image_config(&self) -> &BinaryImageConfig {
        match self {
            Self::AddRm(req) => &req.binary_image_config,
            Self::Merge(req) => &req.binary_image_config,
        }
    }

    /// The variant's overwrite token.
    pub fn override_token(&self) -> Option<&str> {
        match self {
            Self::AddRm(req) => req.overwrite_from_index_token.as_deref(),
            Self::Merge(req) => req.overwrite_target_index_token.as_deref(),
        }
    }

    /// Extra requested arches; only the add/remove variant has them.
    pub fn add_arches(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::AddRm(req) => Some(&req.add_arches),
            Self::Merge(_) => None,
        }
    }

    /// Bundles to add; only the add/remove variant has them.
    pub fn bundles(&self) -> &[String] {
        match self {
            Self::AddRm(req) => &req.bundles,
            Self::Merge(_) => &[],
        }
    }

    /// The pull spec filling an index role in this variant, if any.
    pub fn index_ref(&self, role: IndexRole) -> Option<&str> {
        match (self, role) {
            (Self::AddRm(req), IndexRole::FromIndex) => req.from_index.as_deref(),
            (Self::Merge(req), IndexRole::SourceFromIndex) => Some(&req.source_from_index),
            (Self::Merge(req), IndexRole::TargetIndex) => Some(&req.target_index),
            _ => None,
        }
    }

    /// The binary image for this request.
    ///
    /// The explicit override wins; otherwise the lookup table is
    /// consulted with the validated scope and the `from_index` ocp
    /// version.
    pub fn binary_image_for(
        &self,
        from_index_info: &IndexImageInfo,
        distribution_scope: DistributionScope,
    ) -> Result<String> {
        if let Some(explicit) = self.binary_image_override() {
            return Ok(explicit.to_string());
        }
        binary_image_from_config(
            &from_index_info.ocp_version,
            distribution_scope,
            self.binary_image_config(),
        )
    }
}

/// Look up the binary image for a scope and ocp version.
pub fn binary_image_from_config(
    ocp_version: &str,
    distribution_scope: DistributionScope,
    binary_image_config: &BinaryImageConfig,
) -> Result<String> {
    binary_image_config
        .get(&distribution_scope.to_string())
        .and_then(|by_version| by_version.get(ocp_version))
        .cloned()
        .ok_or_else(|| {
            ForgeError::Config(format!(
                "There is no configured binary_image for distribution_scope: {} and \
                 ocp_version: {}. Please specify a binary_image value in the request.",
                distribution_scope, ocp_version
            ))
        })
}

/// The index roles a request may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexRole {
    FromIndex,
    SourceFromIndex,
    TargetIndex,
}

impl IndexRole {
    pub const ALL: [IndexRole; 3] = [
        IndexRole::FromIndex,
        IndexRole::SourceFromIndex,
        IndexRole::TargetIndex,
    ];

    /// Default ocp version when the role's index is absent.
    pub fn default_ocp_version(&self) -> &'static str {
        match self {
            IndexRole::FromIndex | IndexRole::SourceFromIndex => DEFAULT_OCP_VERSION,
            IndexRole::TargetIndex => "v4.6",
        }
    }
}

impl std::fmt::Display for IndexRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexRole::FromIndex => write!(f, "from_index"),
            IndexRole::SourceFromIndex => write!(f, "source_from_index"),
            IndexRole::TargetIndex => write!(f, "target_index"),
        }
    }
}

/// Resolved metadata of one index image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexImageInfo {
    /// Digest-pinned pull spec; `None` when the index was absent
    pub resolved_pull_spec: Option<String>,
    /// ocp version from the delivery label, or the role default
    pub ocp_version: String,
    /// Arches the index was built for
    pub arches: BTreeSet<String>,
    /// Scope from the distribution label, defaulting to prod
    pub resolved_distribution_scope: DistributionScope,
}

impl IndexImageInfo {
    /// The info an absent index resolves to.
    pub fn default_for(role: IndexRole) -> Self {
        Self {
            resolved_pull_spec: None,
            ocp_version: role.default_ocp_version().to_string(),
            arches: BTreeSet::new(),
            resolved_distribution_scope: DistributionScope::Prod,
        }
    }
}

/// The infos of all three index roles, resolved for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIndexes {
    pub from_index: IndexImageInfo,
    pub source_from_index: IndexImageInfo,
    pub target_index: IndexImageInfo,
}

impl ResolvedIndexes {
    pub fn get(&self, role: IndexRole) -> &IndexImageInfo {
        match role {
            IndexRole::FromIndex => &self.from_index,
            IndexRole::SourceFromIndex => &self.source_from_index,
            IndexRole::TargetIndex => &self.target_index,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexImageInfo> {
        IndexRole::ALL.iter().map(|role| self.get(*role))
    }
}

/// Everything the build executor needs, assembled by preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Arches the index image will be built for; never empty
    pub arches: BTreeSet<String>,
    /// Binary image pull spec as requested or looked up
    pub binary_image: String,
    /// Digest-pinned binary image
    pub binary_image_resolved: String,
    /// Operator package name to its bundles, in request order
    pub bundle_mapping: HashMap<String, Vec<String>>,
    /// Digest-pinned `from_index`, when present
    pub from_index_resolved: Option<String>,
    /// ocp version of `from_index`
    pub ocp_version: String,
    /// Validated distribution scope
    pub distribution_scope: DistributionScope,
    /// Digest-pinned `source_from_index`, when present
    pub source_from_index_resolved: Option<String>,
    /// ocp version of `source_from_index`
    pub source_ocp_version: String,
    /// Digest-pinned `target_index`, when present
    pub target_index_resolved: Option<String>,
    /// ocp version of `target_index`
    pub target_ocp_version: String,
}
