//! Console-sandbox provider. Unlike `hetzner`, there is no SSH-able IP:
//! every operation goes through the provider's own CLI, and the
//! persisted "ip" is the provider-specific sentinel string
//! `sprite-console`.
use super::error::CloudError;
use super::process::{run_capture, run_interactive};
use super::{CloudDriver, InstanceSummary, ServerInfo};
use crate::credentials::{load_bundle, prompt_line, save_bundle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::instrument;

pub const SENTINEL_IP: &str = "sprite-console";
const READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct SpriteDriver {
    credential_path: PathBuf,
    token: Option<String>,
}

impl SpriteDriver {
    pub fn new(credential_path: PathBuf) -> Self {
        Self { credential_path, token: None }
    }

    fn cli(&self, args: &[&str]) -> Result<super::process::ExecOutput, CloudError> {
        let token = self.token.as_deref().ok_or(CloudError::Auth)?;
        self.cli_with_token(args, token)
    }

    fn cli_with_token(&self, args: &[&str], token: &str) -> Result<super::process::ExecOutput, CloudError> {
        let mut argv = vec!["sprite".to_string()];
        argv.extend(args.iter().map(|s| s.to_string()));
        argv.push("--token".to_string());
        argv.push(token.to_string());
        Ok(run_capture(&argv, Some(Duration::from_secs(300)))?)
    }

    fn probe(&self, token: &str) -> bool {
        self.cli_with_token(&["whoami"], token).map(|out| out.exit_code == 0).unwrap_or(false)
    }

    /// Reads the token the `sprite` CLI's own login flow already cached.
    fn cli_native_token(&self) -> Option<String> {
        let argv = vec!["sprite".to_string(), "auth".to_string(), "token".to_string()];
        let out = run_capture(&argv, Some(Duration::from_secs(10))).ok()?;
        if out.exit_code != 0 {
            return None;
        }
        let token = out.stdout.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    fn oauth_login(&self) -> Option<String> {
        let argv = vec!["sprite".to_string(), "login".to_string()];
        let _ = run_interactive(&argv);
        self.cli_native_token()
    }

    fn persist_token(&self, token: &str) {
        let mut bundle = load_bundle(&self.credential_path);
        if bundle.insert("SPRITE_TOKEN", token).is_ok() {
            let _ = save_bundle(&self.credential_path, &bundle);
        }
    }
}

impl CloudDriver for SpriteDriver {
    /// Five-step fallback chain: environment variable, saved credential
    /// bundle, the `sprite` CLI's own cached session token, an
    /// interactive `sprite login`, then a direct prompt.
    #[instrument(skip(self))]
    fn authenticate(&mut self) -> Result<(), CloudError> {
        let bundle = load_bundle(&self.credential_path);

        if let Some(candidate) = std::env::var("SPRITE_TOKEN").ok().filter(|c| self.probe(c)) {
            self.token = Some(candidate);
            return Ok(());
        }
        if let Some(candidate) = bundle.get("SPRITE_TOKEN").map(String::from).filter(|c| self.probe(c)) {
            self.token = Some(candidate);
            return Ok(());
        }
        if let Some(candidate) = self.cli_native_token().filter(|c| self.probe(c)) {
            self.persist_token(&candidate);
            self.token = Some(candidate);
            return Ok(());
        }
        if let Some(candidate) = self.oauth_login().filter(|c| self.probe(c)) {
            self.persist_token(&candidate);
            self.token = Some(candidate);
            return Ok(());
        }
        if let Some(candidate) = prompt_line("Sprite API token: ").filter(|c| self.probe(c)) {
            self.persist_token(&candidate);
            self.token = Some(candidate);
            return Ok(());
        }
        Err(CloudError::Auth)
    }

    fn prompt_size(&mut self) {}

    #[instrument(skip(self))]
    fn create_server(&mut self, name: &str) -> Result<ServerInfo, CloudError> {
        let out = self.cli(&["create", name, "--tier", "full", "--json"])?;
        if out.exit_code != 0 {
            return Err(CloudError::Provision { reason: out.stderr });
        }
        let body: serde_json::Value =
            serde_json::from_str(&out.stdout).map_err(|e| CloudError::Provision { reason: e.to_string() })?;
        let server_id = body["id"]
            .as_str()
            .ok_or_else(|| CloudError::Provision { reason: "missing id in sprite response".into() })?
            .to_string();
        Ok(ServerInfo { server_id, ip: SENTINEL_IP.to_string(), user: "sprite".to_string() })
    }

    fn wait_ready(&self, server_id: &str) -> Result<(), CloudError> {
        let deadline = Instant::now() + READY_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(out) = self.cli(&["status", server_id]) {
                if out.stdout.trim() == "ready" {
                    return Ok(());
                }
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
        Err(CloudError::ReadyTimeout)
    }

    fn run(&self, server_id: &str, cmd: &str, _timeout: Option<Duration>) -> Result<i32, CloudError> {
        Ok(self.cli(&["exec", server_id, "--", cmd])?.exit_code)
    }

    fn run_capture(&self, server_id: &str, cmd: &str, _timeout: Option<Duration>) -> Result<String, CloudError> {
        Ok(self.cli(&["exec", server_id, "--", cmd])?.stdout)
    }

    fn upload(&self, server_id: &str, local: &Path, remote: &str) -> Result<(), CloudError> {
        super::validate_remote_path(remote)?;
        let out = self.cli(&["push", server_id, &local.display().to_string(), remote])?;
        if out.exit_code != 0 {
            return Err(CloudError::Exec(out.exit_code));
        }
        Ok(())
    }

    fn interactive(&self, server_id: &str, cmd: &str) -> Result<i32, CloudError> {
        let token = self.token.as_deref().ok_or(CloudError::Auth)?;
        let argv = vec![
            "sprite".to_string(),
            "console".to_string(),
            server_id.to_string(),
            "--token".to_string(),
            token.to_string(),
            "--".to_string(),
            cmd.to_string(),
        ];
        Ok(run_interactive(&argv)?)
    }

    fn destroy(&self, server_id: &str) -> Result<(), CloudError> {
        let out = self.cli(&["destroy", server_id])?;
        if out.exit_code == 0 || out.stderr.to_lowercase().contains("not found") {
            return Ok(());
        }
        Err(CloudError::DestroyFailed(out.stderr))
    }

    fn list(&self) -> Result<Vec<InstanceSummary>, CloudError> {
        let out = self.cli(&["list", "--json"])?;
        let body: serde_json::Value = serde_json::from_str(&out.stdout).unwrap_or_default();
        Ok(body
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| {
                Some(InstanceSummary {
                    server_id: s["id"].as_str()?.to_string(),
                    server_name: s["name"].as_str()?.to_string(),
                    ip: SENTINEL_IP.to_string(),
                })
            })
            .collect())
    }
}
