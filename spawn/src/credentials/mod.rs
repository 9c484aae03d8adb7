//! Per-provider credential persistence and the interactive-prompt
//! fallback, backing the authentication chain each `CloudDriver` runs
//! through in `authenticate()`.
use fs::file::reader::FileReader;
use fs::LocalFile;
use richenv::{EnvVarError, EnvVarKey, EnvVarValue};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

use crate::util::{atomic_write, AtomicWriteError};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    InvalidField(#[from] EnvVarError),
    #[error("failed to read credential file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse credential file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write credential file: {0}")]
    Write(#[from] AtomicWriteError),
}

/// A provider's validated token set, keyed by env var name (e.g.
/// `HCLOUD_TOKEN`). Reuses `richenv`'s charset validation: the same
/// conservative charset it enforces for `.spawnrc` values also governs
/// credential tokens.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle(HashMap<String, String>);

impl CredentialBundle {
    pub fn get(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(String::as_str)
    }

    pub fn insert(&mut self, var: impl Into<String>, value: impl Into<String>) -> Result<(), CredentialError> {
        let var = var.into();
        let value = value.into();
        let _ = EnvVarKey::new(&var)?;
        let _ = EnvVarValue::new(&value)?;
        self.0.insert(var, value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Loads the bundle for `cloud_key` from `path`. A missing file, or a file
/// that fails to parse or validate, is treated as an absent/empty bundle
/// rather than a hard error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_bundle(path: &Path) -> CredentialBundle {
    let raw = match LocalFile.read(path) {
        Ok(raw) => raw,
        Err(_) => return CredentialBundle::default(),
    };
    let parsed: HashMap<String, String> = match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(_) => return CredentialBundle::default(),
    };
    let mut bundle = CredentialBundle::default();
    for (key, value) in parsed {
        if bundle.insert(key, value).is_err() {
            return CredentialBundle::default();
        }
    }
    bundle
}

/// Persists `bundle` to `path` atomically, mode 0600 (`fs::LocalFile::write`).
pub fn save_bundle(path: &Path, bundle: &CredentialBundle) -> Result<(), CredentialError> {
    let body = serde_json::to_string_pretty(&bundle.0)?;
    atomic_write(path, body)?;
    Ok(())
}

/// Computes the still-missing subset of `required_vars`: environment
/// variables win over the saved bundle.
pub fn missing_required(required_vars: &[String], bundle: &CredentialBundle) -> Vec<String> {
    required_vars
        .iter()
        .filter(|var| env::var(var).is_err() && bundle.get(var).is_none())
        .cloned()
        .collect()
}

/// Resolves one required variable, preferring the environment over the
/// saved bundle.
pub fn resolve_var(var: &str, bundle: &CredentialBundle) -> Option<String> {
    env::var(var).ok().or_else(|| bundle.get(var).map(String::from))
}

/// Prompts on stderr and reads one trimmed line from stdin, the last
/// fallback of the authentication chain. `None` on EOF, a read error, or
/// an empty line, so a non-interactive or redirected invocation degrades
/// to an auth failure instead of hanging or panicking.
pub fn prompt_line(prompt: &str) -> Option<String> {
    use std::io::Write;
    eprint!("{prompt}");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
