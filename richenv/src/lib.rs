//! Validated environment variable keys and values.
//!
//! Used wherever a map of environment variables is about to be persisted or
//! injected into a remote shell: credential bundles, the agent installer's
//! environment map, and the `.spawnrc` file uploaded to a provisioned host.
pub mod envvar;

pub use envvar::{EnvVarError, EnvVarKey, EnvVarValue, EnvVars};
