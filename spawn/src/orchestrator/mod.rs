//! The launch pipeline: resolve, pre-flight credentials, provision,
//! install, inject environment, and hand off the terminal.
pub mod dry_run;
pub mod error;
pub mod pipeline;

pub use dry_run::{CredentialReadiness, DryRunPreview};
pub use error::OrchestratorError;
pub use pipeline::{LaunchOutcome, LaunchRequest, Orchestrator};
