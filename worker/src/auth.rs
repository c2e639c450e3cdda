//! Scoped registry authentication.
//!
//! An override token is merged into the shared credential file for the
//! duration of a scope and the file is restored to its exact pre-call
//! state when the scope ends, whether the scoped operation succeeded
//! or not. The credential file is process-wide shared state; callers
//! must not run two scopes against the same path concurrently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use forge_core::error::{ForgeError, Result};

use crate::reference;

/// The credential file state captured before an override is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSnapshot {
    /// The path did not exist as a plain file; restoration removes it.
    Absent,
    /// The plain-file content to rewrite on restoration.
    Content(String),
}

impl CredentialSnapshot {
    /// Capture the current state of the credential file.
    ///
    /// Symlinks are captured as [`CredentialSnapshot::Absent`]: the
    /// override replaces them with a plain file and restoration removes
    /// that file again.
    pub fn capture(path: &Path) -> Self {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_file() => match std::fs::read_to_string(path) {
                Ok(content) => Self::Content(content),
                Err(_) => Self::Absent,
            },
            Ok(_) => Self::Absent,
            Err(_) => Self::Absent,
        }
    }

    /// Restore the credential file to the captured state.
    pub fn restore(&self, path: &Path) -> Result<()> {
        match self {
            Self::Content(content) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, content)?;
            }
            Self::Absent => match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }
}

/// Guard holding a credential override; restores the snapshot when
/// released or dropped.
#[derive(Debug)]
pub struct AuthGuard {
    path: PathBuf,
    snapshot: Option<CredentialSnapshot>,
}

impl AuthGuard {
    fn noop(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            snapshot: None,
        }
    }

    /// Restore the captured state. Idempotent; a second call is a
    /// no-op.
    pub fn release(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::debug!(path = %self.path.display(), "Restoring the registry credential file");
            snapshot.restore(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for AuthGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to restore the registry credential file"
            );
        }
    }
}

/// Per-registry auth entry of the credential file.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    /// base64-encoded `user:password`
    pub auth: String,
}

impl RegistryAuth {
    /// Encode a `user:password` token.
    pub fn from_token(token: &str) -> Self {
        Self {
            auth: BASE64.encode(token),
        }
    }
}

/// Scope an override token to the registry a pull spec is from.
///
/// A no-op guard is returned when either the token or the image is
/// absent.
pub fn set_registry_token(
    auth_file: &Path,
    token: Option<&str>,
    container_image: Option<&str>,
) -> Result<AuthGuard> {
    let (Some(token), Some(container_image)) = (token, container_image) else {
        tracing::debug!(
            "Not changing the registry credentials since no token or image was provided"
        );
        return Ok(AuthGuard::noop(auth_file));
    };

    let registry = reference::registry_host(container_image);
    let mut auths = HashMap::new();
    auths.insert(registry.to_string(), RegistryAuth::from_token(token));
    set_registry_auths(auth_file, &auths)
}

/// Scope an arbitrary auths mapping, pre-authorizing several registries
/// at once.
pub fn set_registry_auths(
    auth_file: &Path,
    auths: &HashMap<String, RegistryAuth>,
) -> Result<AuthGuard> {
    if auths.is_empty() {
        tracing::debug!("Not changing the registry credentials since no auths were provided");
        return Ok(AuthGuard::noop(auth_file));
    }

    let mut guard = AuthGuard {
        path: auth_file.to_path_buf(),
        snapshot: Some(CredentialSnapshot::capture(auth_file)),
    };
    if let Err(err) = write_merged(auth_file, auths) {
        // The guard restores whatever the partial write left behind
        if let Err(restore_err) = guard.release() {
            tracing::warn!(
                path = %auth_file.display(),
                error = %restore_err,
                "Failed to restore the registry credential file"
            );
        }
        return Err(err);
    }
    Ok(guard)
}

fn write_merged(auth_file: &Path, auths: &HashMap<String, RegistryAuth>) -> Result<()> {
    // Reading follows a symlink, so a template link contributes its
    // content to the merge base; the link itself is replaced by a plain
    // file so the template is never written through.
    let mut config: Value = match std::fs::read_to_string(auth_file) {
        Ok(content) => serde_json::from_str(&content).map_err(|e| {
            ForgeError::Serialization(format!(
                "Failed to parse the registry credential file {}: {}",
                auth_file.display(),
                e
            ))
        })?,
        Err(_) => json!({}),
    };
    if let Ok(meta) = std::fs::symlink_metadata(auth_file) {
        if !meta.file_type().is_file() {
            std::fs::remove_file(auth_file)?;
        }
    }

    if !config.is_object() {
        config = json!({});
    }
    let entries = config
        .as_object_mut()
        .and_then(|root| {
            root.entry("auths")
                .or_insert_with(|| json!({}))
                .as_object_mut()
        })
        .ok_or_else(|| {
            ForgeError::Serialization(format!(
                "The registry credential file {} has a non-object \"auths\" key",
                auth_file.display()
            ))
        })?;

    let registries: Vec<&str> = auths.keys().map(String::as_str).collect();
    tracing::debug!(
        registries = ?registries,
        "Setting the override token for the registries in the credential file"
    );
    for (registry, entry) in auths {
        entries.insert(registry.clone(), json!({ "auth": entry.auth }));
    }

    if let Some(parent) = auth_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(auth_file, serde_json::to_string(&config)?)?;
    Ok(())
}
