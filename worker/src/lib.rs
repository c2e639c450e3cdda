//! Index image build preparation.
//!
//! Resolves and validates everything an index image build needs before
//! the build itself runs: digest-pinned image references, architecture
//! sets, distribution scope, registry credentials and the bundle
//! mapping. The build command execution, task dispatch and HTTP API
//! live elsewhere; this crate only prepares a [`request::BuildPlan`].

pub mod arch;
pub mod auth;
pub mod bundle;
pub mod cache;
pub mod exec;
pub mod inspect;
pub mod prepare;
pub mod pull;
pub mod reference;
pub mod reqlog;
pub mod request;
pub mod retry;
pub mod scope;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use forge_core::error::{ForgeError, Result};
pub use forge_core::WorkerConfig;
pub use inspect::ImageInspector;
pub use prepare::RequestPreparer;
pub use request::{BuildPlan, RequestConfig};
pub use scope::DistributionScope;
