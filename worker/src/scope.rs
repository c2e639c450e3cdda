//! Distribution scope of an index image.
//!
//! Scopes are totally ordered: dev < stage < prod. A rebuild may
//! narrow the scope of its base index but never broaden it.

use serde::{Deserialize, Serialize};

use forge_core::error::{ForgeError, Result};

/// How widely an index image may be distributed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DistributionScope {
    Dev,
    Stage,
    #[default]
    Prod,
}

impl std::fmt::Display for DistributionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Stage => write!(f, "stage"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

impl std::str::FromStr for DistributionScope {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dev" => Ok(Self::Dev),
            "stage" => Ok(Self::Stage),
            "prod" => Ok(Self::Prod),
            _ => Err(ForgeError::Validation(format!(
                "unknown distribution scope: '{}' (supported: dev, stage, prod)",
                s
            ))),
        }
    }
}

/// Validate that a requested scope does not broaden the resolved one.
///
/// With no requested scope the resolved scope stands. Otherwise the
/// request must rank at or below the resolved scope.
pub fn validate_distribution_scope(
    resolved: DistributionScope,
    requested: Option<DistributionScope>,
) -> Result<DistributionScope> {
    match requested {
        None => Ok(resolved),
        Some(requested) if requested > resolved => Err(ForgeError::Validation(format!(
            "Cannot set \"distribution_scope\" to {} because the from index is already set to {}",
            requested, resolved
        ))),
        Some(requested) => Ok(requested),
    }
}
