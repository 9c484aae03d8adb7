//! Cloud driver interface and the concrete provider set: `hetzner`,
//! `sprite`, `daytona`.
pub mod cloud_init;
pub mod daytona;
pub mod error;
pub mod hetzner;
pub mod process;
pub mod registry_lookup;
pub mod sizing;
pub mod sprite;

pub use cloud_init::CloudInitScript;
pub use error::{CloudError, DownloadError};

use std::path::Path;
use std::time::Duration;

/// A server created by `create_server`, persisted into the spawn record
/// immediately: saved on success so a later crash cannot orphan the
/// instance invisibly.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server_id: String,
    pub ip: String,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct InstanceSummary {
    pub server_id: String,
    pub server_name: String,
    pub ip: String,
}

/// The uniform capability interface every provider implements. The
/// orchestrator depends on this trait only — it never names a concrete
/// provider type.
#[cfg_attr(test, mockall::automock)]
pub trait CloudDriver {
    /// Tries env var, saved bundle, CLI session token, OAuth, then an
    /// interactive prompt, validating each candidate with a read-only
    /// probe call before accepting it.
    fn authenticate(&mut self) -> Result<(), CloudError>;

    /// Sets region/machine-size state from env, config, or an interactive
    /// picker. Non-fatal: falls back to the provider default.
    fn prompt_size(&mut self);

    fn create_server(&mut self, name: &str) -> Result<ServerInfo, CloudError>;

    fn wait_ready(&self, server_id: &str) -> Result<(), CloudError>;

    fn run(&self, server_id: &str, cmd: &str, timeout: Option<Duration>) -> Result<i32, CloudError>;

    fn run_capture(
        &self,
        server_id: &str,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<String, CloudError>;

    /// `remote` must match `^[A-Za-z0-9/_.~-]+$`.
    fn upload(&self, server_id: &str, local: &Path, remote: &str) -> Result<(), CloudError>;

    /// Hands the terminal to `cmd`, returning its exit code.
    fn interactive(&self, server_id: &str, cmd: &str) -> Result<i32, CloudError>;

    /// Treats 404/not-found as success.
    fn destroy(&self, server_id: &str) -> Result<(), CloudError>;

    fn list(&self) -> Result<Vec<InstanceSummary>, CloudError>;
}

const REMOTE_PATH_RE: &str = r"^[A-Za-z0-9/_.~-]+$";

pub fn validate_remote_path(remote: &str) -> Result<(), CloudError> {
    use regex::Regex;
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(REMOTE_PATH_RE).unwrap());
    if re.is_match(remote) {
        Ok(())
    } else {
        Err(CloudError::InvalidRemotePath(remote.to_string()))
    }
}
