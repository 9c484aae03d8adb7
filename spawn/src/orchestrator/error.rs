//! Orchestrator error taxonomy.
use crate::agent::InstallError;
use crate::cloud::CloudError;
use crate::registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown agent `{0}`")]
    UnknownAgent(String),
    #[error("unknown cloud `{0}`")]
    UnknownCloud(String),
    #[error("`{agent}` is not implemented on `{cloud}`{}", render_candidates(.agent, .candidates))]
    NotImplemented { cloud: String, agent: String, candidates: Vec<String> },
    #[error("missing required credentials: {0:?}")]
    MissingCredentials(Vec<String>),
    #[error("instance name `{0}` is not a valid kebab-case identifier of at most 64 characters")]
    InvalidName(String),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("cancelled: server may still be running, check the provider dashboard")]
    Cancelled,
}

/// Renders up to three alternate-cloud suggestions as `spawn <agent> <c>`
/// hints. Empty when the manifest has no implemented alternative.
fn render_candidates(agent: &str, candidates: &[String]) -> String {
    if candidates.is_empty() {
        return String::new();
    }
    let hints: Vec<String> = candidates.iter().map(|c| format!("`spawn {agent} {c}`")).collect();
    format!(", try: {}", hints.join(", "))
}
