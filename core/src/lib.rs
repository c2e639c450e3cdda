//! Forge Core - Foundational Types
//!
//! This crate provides the error type and worker configuration shared
//! across the index image build worker.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::WorkerConfig;
pub use error::{ForgeError, Result};

/// Forge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
