//! Image pull wrapper.
//!
//! Thin, retried wrapper over the external pull tool. There is no
//! structured output; success is the only result.

use forge_core::error::{ForgeError, Result};

use crate::exec::{CommandRunner, RunOptions};
use crate::retry::{with_retry, RetryPolicy};

/// Pull one or more images, retrying transient failures.
pub fn pull_images(
    runner: &dyn CommandRunner,
    policy: &RetryPolicy,
    pull_specs: &[String],
) -> Result<()> {
    let mut cmd = vec!["podman".to_string(), "pull".to_string()];
    cmd.extend_from_slice(pull_specs);
    let opts = RunOptions::with_context(format!(
        "Failed to pull the container image {}",
        pull_specs.join(" ")
    ));

    with_retry(
        policy,
        |err| matches!(err, ForgeError::Command(_)),
        || runner.run(&cmd, &opts).map(|_| ()),
    )
}
