//! Environment injection contract.
//!
//! Serializes the environment map as a `KEY="VALUE"` file (via
//! `richenv::EnvVars::to_env_file`), base64-encodes it for transport, and
//! provides the idempotent `.bashrc`/`.zshrc` source line the orchestrator
//! appends remotely.
use base64::{engine::general_purpose::STANDARD, Engine};
use richenv::EnvVars;

pub const SPAWNRC_PATH: &str = "~/.spawnrc";

/// The line appended to `.bashrc`/`.zshrc`, guarded so re-running the
/// installer never duplicates it.
pub fn source_line() -> String {
    format!("[ -f {SPAWNRC_PATH} ] && source {SPAWNRC_PATH}")
}

/// Returns the shell command that appends [`source_line`] to `rc_file`
/// only if it is not already present.
pub fn idempotent_append_command(rc_file: &str) -> String {
    let line = source_line();
    format!("grep -qxF '{line}' {rc_file} 2>/dev/null || echo '{line}' >> {rc_file}")
}

/// Base64-encodes the `.spawnrc` contents for upload; the remote side
/// decodes and writes it with mode 0600.
pub fn encode_spawnrc(env: &EnvVars) -> String {
    STANDARD.encode(env.to_env_file())
}

/// The remote command that decodes the uploaded base64 blob into
/// `~/.spawnrc` at mode 0600.
pub fn decode_command(remote_tmp_path: &str) -> String {
    format!(
        "base64 -d {remote_tmp_path} > {SPAWNRC_PATH} && chmod 600 {SPAWNRC_PATH} && rm -f {remote_tmp_path}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use richenv::{EnvVarKey, EnvVarValue};

    #[test]
    fn encode_round_trips() {
        let env = EnvVars::default()
            .with_var(EnvVarKey::new("OPENROUTER_API_KEY").unwrap(), EnvVarValue::new("sk-or-abc").unwrap());
        let encoded = encode_spawnrc(&env);
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "OPENROUTER_API_KEY=\"sk-or-abc\"\n");
    }

    #[test]
    fn source_line_is_idempotency_guarded() {
        let cmd = idempotent_append_command("~/.bashrc");
        assert!(cmd.contains("grep -qxF"));
    }
}
