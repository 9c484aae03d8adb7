//! Cloud driver error taxonomy: Auth, Provision, Ready timeout,
//! Execution, Download.
use crate::cloud::process::ExecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("no valid credentials for this provider after trying environment, saved bundle, CLI session, and interactive prompt")]
    Auth,
    #[error("provisioning failed: {reason}")]
    Provision { reason: String },
    #[error("no viable server type/region substitute for the request before any resources were created")]
    NoViableSubstitute,
    #[error("server did not become ready within the timeout")]
    ReadyTimeout,
    #[error("remote command exited non-zero: {0}")]
    Exec(i32),
    #[error(transparent)]
    Process(#[from] ExecError),
    #[error("upload rejected: remote path `{0}` contains disallowed characters")]
    InvalidRemotePath(String),
    #[error("script or manifest download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("destroy failed: {0} (clean up manually from the provider dashboard)")]
    DestroyFailed(String),
    #[error("operation cancelled: server may still be running, check the provider dashboard")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("resource not found (404)")]
    NotFound,
    #[error("HTTP error {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

/// Retries a read-only provider API call on 429/5xx with exponential
/// backoff (2s, 4s, ... capped at 30s), up to 3 attempts total.
pub fn retry_read_only<T, E>(mut call: impl FnMut() -> Result<T, E>) -> Result<T, E>
where
    E: IsRetryable,
{
    let mut delay = std::time::Duration::from_secs(2);
    let mut attempt = 0;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < 2 && err.is_retryable() => {
                attempt += 1;
                std::thread::sleep(delay);
                delay = (delay * 2).min(std::time::Duration::from_secs(30));
            }
            Err(err) => return Err(err),
        }
    }
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for DownloadError {
    fn is_retryable(&self) -> bool {
        matches!(self, DownloadError::Http(429) | DownloadError::Http(500..=599) | DownloadError::Network(_))
    }
}
