//! Agent installer interface and the concrete installer catalog:
//! `claude`, `codex`, `generic`.
pub mod claude;
pub mod codex;
pub mod env_injection;
pub mod generic;

use crate::cloud::{CloudDriver, CloudError};
use crate::manifest::CloudInitTier;
use richenv::{EnvVarError, EnvVars};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("install step exited non-zero: {0}")]
    StepFailed(i32),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error("invalid environment value: {0}")]
    Env(#[from] EnvVarError),
    #[error("pre-provision hook failed: {0}")]
    PreProvision(String),
}

/// Each agent declares required tier, install commands, an environment map
/// built from the OpenRouter API key, and up to three optional hooks.
pub trait AgentInstaller {
    fn required_tier(&self) -> CloudInitTier;

    /// Ordered remote shell invocations, each run via the cloud driver's
    /// `run`.
    fn install_steps(&self) -> Vec<String>;

    /// Builds the `.spawnrc` environment map from the OpenRouter key and,
    /// for agents that need it, a chosen model identifier.
    fn environment(&self, api_key: &str, model: Option<&str>) -> Result<EnvVars, InstallError>;

    /// Runs locally, before the VM is created (e.g. to prompt for a model
    /// from a whitelist). Most agents don't need one.
    fn pre_provision_hook(&mut self) -> Result<(), InstallError> {
        Ok(())
    }

    /// Runs remotely, after environment injection (e.g. to write a
    /// provider-specific settings file).
    fn configure_hook(&self, _driver: &dyn CloudDriver, _server_id: &str) -> Result<(), CloudError> {
        Ok(())
    }

    /// Runs remotely, just before the interactive session (e.g. starting
    /// a background gateway as a fire-and-forget process).
    fn pre_launch_hook(&self, _driver: &dyn CloudDriver, _server_id: &str) -> Result<(), CloudError> {
        Ok(())
    }

    /// The exact shell invocation that becomes the foreground process.
    fn launch_command(&self) -> String;
}

/// Registration seam mirroring [`crate::cloud::registry_lookup`]: the only
/// place that names a concrete installer type.
pub fn build_installer(agent_key: &str) -> Option<Box<dyn AgentInstaller>> {
    match agent_key {
        "claude" => Some(Box::new(claude::ClaudeInstaller::default())),
        "codex" => Some(Box::new(codex::CodexInstaller::default())),
        "generic" => None, // constructed by the caller from the manifest's AgentDef; see generic::GenericInstaller::from_def
        _ => None,
    }
}
