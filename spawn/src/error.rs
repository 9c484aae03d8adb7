//! Top-level error taxonomy.
//!
//! Each module owns its own `thiserror` enum; this type composes them at
//! the CLI/headless boundary, sitting on top of per-module errors the way
//! a top-level `CliError`/`InitError` usually does.
use crate::agent::InstallError;
use crate::cloud::CloudError;
use crate::credentials::CredentialError;
use crate::manifest::ManifestError;
use crate::orchestrator::OrchestratorError;
use crate::registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("interrupted")]
    Interrupted,
}

/// The stable machine-readable error codes of the headless bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ManifestError,
    UnknownAgent,
    UnknownCloud,
    NotImplemented,
    MissingCredentials,
    DownloadError,
    ExecutionError,
}

impl SpawnError {
    /// Maps an error to the headless envelope's `error_code` and the
    /// process exit code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SpawnError::Validation(_) => ErrorCode::ValidationError,
            SpawnError::Manifest(_) => ErrorCode::ManifestError,
            SpawnError::Credential(_) => ErrorCode::MissingCredentials,
            SpawnError::Cloud(CloudError::Download(_)) => ErrorCode::DownloadError,
            SpawnError::Cloud(_) => ErrorCode::ExecutionError,
            SpawnError::Install(_) => ErrorCode::ExecutionError,
            SpawnError::Registry(_) => ErrorCode::ExecutionError,
            SpawnError::Orchestrator(OrchestratorError::NotImplemented { .. }) => {
                ErrorCode::NotImplemented
            }
            SpawnError::Orchestrator(OrchestratorError::MissingCredentials(_)) => {
                ErrorCode::MissingCredentials
            }
            SpawnError::Orchestrator(OrchestratorError::UnknownAgent(_)) => ErrorCode::UnknownAgent,
            SpawnError::Orchestrator(OrchestratorError::UnknownCloud(_)) => ErrorCode::UnknownCloud,
            SpawnError::Orchestrator(_) => ErrorCode::ExecutionError,
            SpawnError::Interrupted => ErrorCode::ExecutionError,
        }
    }

    /// Process exit code: 0 success, 1 generic, 2 download, 3
    /// validation/credentials, 130 interrupted.
    pub fn exit_code(&self) -> i32 {
        if matches!(self, SpawnError::Interrupted) {
            return 130;
        }
        match self.error_code() {
            ErrorCode::DownloadError => 2,
            ErrorCode::ValidationError
            | ErrorCode::MissingCredentials
            | ErrorCode::UnknownAgent
            | ErrorCode::UnknownCloud
            | ErrorCode::NotImplemented => 3,
            ErrorCode::ManifestError | ErrorCode::ExecutionError => 1,
        }
    }
}
