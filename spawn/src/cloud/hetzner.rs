//! Classic VM provider with SSH access. Provisioning goes through the
//! Hetzner Cloud API; command execution and file transfer go through the
//! local `ssh`/`scp` binaries via [`crate::cloud::process`], shelling out
//! to supervised child processes rather than reimplementing a protocol.
use super::cloud_init::CloudInitScript;
use super::error::{CloudError, DownloadError};
use super::process::{run_capture, run_interactive};
use super::sizing::{self, Requirement, ServerType};
use super::{CloudDriver, InstanceSummary, ServerInfo};
use crate::credentials::{load_bundle, prompt_line, save_bundle, CredentialBundle};
use crate::manifest::CloudInitTier;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

const API_BASE: &str = "https://api.hetzner.cloud/v1";
const DEFAULT_SERVER_TYPE: &str = "cx22";
const DEFAULT_LOCATION: &str = "nbg1";
const READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn catalog() -> Vec<ServerType> {
    vec![
        ServerType { name: "cx22".into(), cpu_family: "intel".into(), cores: 2, memory_gb: 4, hourly_price_cents: 1 },
        ServerType { name: "cax11".into(), cpu_family: "arm".into(), cores: 2, memory_gb: 4, hourly_price_cents: 1 },
        ServerType { name: "cx32".into(), cpu_family: "intel".into(), cores: 4, memory_gb: 8, hourly_price_cents: 2 },
    ]
}

pub struct HetznerDriver {
    credential_path: PathBuf,
    client: reqwest::blocking::Client,
    token: Option<String>,
    server_type: String,
    location: String,
}

impl HetznerDriver {
    pub fn new(credential_path: PathBuf) -> Self {
        Self {
            credential_path,
            client: reqwest::blocking::Client::new(),
            token: None,
            server_type: DEFAULT_SERVER_TYPE.to_string(),
            location: DEFAULT_LOCATION.to_string(),
        }
    }

    fn bundle(&self) -> CredentialBundle {
        load_bundle(&self.credential_path)
    }

    fn token(&self) -> Result<&str, CloudError> {
        self.token.as_deref().ok_or(CloudError::Auth)
    }

    fn probe(&self, token: &str) -> bool {
        self.client
            .get(format!("{API_BASE}/servers?per_page=1"))
            .bearer_auth(token)
            .send()
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    fn ssh_target(&self, ip: &str) -> String {
        format!("root@{ip}")
    }

    /// Reads `hcloud`'s own active context, the session token its own
    /// `hcloud auth login` leaves behind.
    fn cli_native_token(&self) -> Option<String> {
        let argv = vec![
            "hcloud".to_string(),
            "context".to_string(),
            "active".to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        let out = run_capture(&argv, Some(Duration::from_secs(10))).ok()?;
        if out.exit_code != 0 {
            return None;
        }
        let parsed: serde_json::Value = serde_json::from_str(&out.stdout).ok()?;
        parsed["token"].as_str().map(String::from)
    }

    fn oauth_login(&self) -> Option<String> {
        let argv = vec!["hcloud".to_string(), "auth".to_string(), "login".to_string()];
        let _ = run_interactive(&argv);
        self.cli_native_token()
    }

    fn persist_token(&self, token: &str) {
        let mut bundle = self.bundle();
        if bundle.insert("HCLOUD_TOKEN", token).is_ok() {
            let _ = save_bundle(&self.credential_path, &bundle);
        }
    }
}

impl CloudDriver for HetznerDriver {
    /// Five-step fallback chain: environment variable, saved credential
    /// bundle, `hcloud`'s own active session token, an interactive
    /// `hcloud auth login`, then a direct prompt. Each candidate is
    /// probed against the API before being accepted; a token earned past
    /// the first two steps is written back to the bundle so later runs
    /// skip straight to step two.
    #[instrument(skip(self))]
    fn authenticate(&mut self) -> Result<(), CloudError> {
        let bundle = self.bundle();

        if let Some(candidate) = std::env::var("HCLOUD_TOKEN").ok().filter(|c| self.probe(c)) {
            self.token = Some(candidate);
            return Ok(());
        }
        if let Some(candidate) = bundle.get("HCLOUD_TOKEN").map(String::from).filter(|c| self.probe(c)) {
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
        if let Some(candidate) = prompt_line("Hetzner Cloud API token: ").filter(|c| self.probe(c)) {
            self.persist_token(&candidate);
            self.token = Some(candidate);
            return Ok(());
        }
        Err(CloudError::Auth)
    }

    fn prompt_size(&mut self) {
        if let Ok(t) = std::env::var("SPAWN_HETZNER_SERVER_TYPE") {
            self.server_type = t;
        }
        if let Ok(l) = std::env::var("SPAWN_HETZNER_LOCATION") {
            self.location = l;
        }
    }

    #[instrument(skip(self))]
    fn create_server(&mut self, name: &str) -> Result<ServerInfo, CloudError> {
        let token = self.token()?.to_string();
        let (server_type, substituted) = sizing::select(
            &catalog(),
            Some(&self.server_type),
            Requirement { cpu_family: Some("intel"), min_cores: 2, min_memory_gb: 4 },
        )?;
        if substituted {
            info!(from = %self.server_type, to = %server_type.name, "substituted unavailable server type");
        }
        let userdata = CloudInitScript::for_tier(CloudInitTier::Full);

        let payload = serde_json::json!({
            "name": name,
            "server_type": server_type.name,
            "location": self.location,
            "image": "ubuntu-22.04",
            "user_data": userdata.script(),
        });

        let response = self
            .client
            .post(format!("{API_BASE}/servers"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .map_err(|err| CloudError::Provision { reason: err.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(CloudError::Provision {
                reason: format!("hetzner API returned {status}: {body}"),
            });
        }

        let body: serde_json::Value = response
            .json()
            .map_err(|err| CloudError::Provision { reason: err.to_string() })?;

        let server_id = body["server"]["id"]
            .as_u64()
            .ok_or_else(|| CloudError::Provision { reason: "missing server id in response".into() })?
            .to_string();
        let ip = body["server"]["public_net"]["ipv4"]["ip"]
            .as_str()
            .ok_or_else(|| CloudError::Provision { reason: "missing ipv4 address in response".into() })?
            .to_string();

        Ok(ServerInfo { server_id, ip, user: "root".to_string() })
    }

    #[instrument(skip(self))]
    fn wait_ready(&self, server_id: &str) -> Result<(), CloudError> {
        let deadline = Instant::now() + READY_TIMEOUT;
        let ip = self.ip_of(server_id)?;
        while Instant::now() < deadline {
            let argv = vec![
                "ssh".to_string(),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-o".to_string(),
                "ConnectTimeout=5".to_string(),
                self.ssh_target(&ip),
                CloudInitScript::ready_probe_command(),
            ];
            if let Ok(out) = run_capture(&argv, Some(Duration::from_secs(10))) {
                if out.exit_code == 0 {
                    return Ok(());
                }
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
        Err(CloudError::ReadyTimeout)
    }

    fn run(&self, server_id: &str, cmd: &str, timeout: Option<Duration>) -> Result<i32, CloudError> {
        Ok(self.ssh_exec(server_id, cmd, timeout)?.exit_code)
    }

    fn run_capture(&self, server_id: &str, cmd: &str, timeout: Option<Duration>) -> Result<String, CloudError> {
        Ok(self.ssh_exec(server_id, cmd, timeout)?.stdout)
    }

    fn upload(&self, server_id: &str, local: &Path, remote: &str) -> Result<(), CloudError> {
        super::validate_remote_path(remote)?;
        let ip = self.ip_of(server_id)?;
        let argv = vec![
            "scp".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            local.display().to_string(),
            format!("{}:{}", self.ssh_target(&ip), remote),
        ];
        let out = run_capture(&argv, Some(Duration::from_secs(60)))?;
        if out.exit_code != 0 {
            return Err(CloudError::Exec(out.exit_code));
        }
        Ok(())
    }

    fn interactive(&self, server_id: &str, cmd: &str) -> Result<i32, CloudError> {
        let ip = self.ip_of(server_id)?;
        let argv = vec![
            "ssh".to_string(),
            "-tt".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            self.ssh_target(&ip),
            cmd.to_string(),
        ];
        Ok(run_interactive(&argv)?)
    }

    #[instrument(skip(self))]
    fn destroy(&self, server_id: &str) -> Result<(), CloudError> {
        let token = self.token()?;
        let response = self
            .client
            .delete(format!("{API_BASE}/servers/{server_id}"))
            .bearer_auth(token)
            .send()
            .map_err(|err| CloudError::DestroyFailed(err.to_string()))?;
        match response.status().as_u16() {
            200..=299 | 404 => Ok(()),
            other => Err(CloudError::DestroyFailed(format!("hetzner API returned {other}"))),
        }
    }

    fn list(&self) -> Result<Vec<InstanceSummary>, CloudError> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!("{API_BASE}/servers"))
            .bearer_auth(token)
            .send()
            .map_err(|err| CloudError::Download(DownloadError::Network(err)))?;
        let body: serde_json::Value = response
            .json()
            .map_err(|err| CloudError::Download(DownloadError::Network(err)))?;
        let servers = body["servers"].as_array().cloned().unwrap_or_default();
        Ok(servers
            .into_iter()
            .filter_map(|s| {
                Some(InstanceSummary {
                    server_id: s["id"].as_u64()?.to_string(),
                    server_name: s["name"].as_str()?.to_string(),
                    ip: s["public_net"]["ipv4"]["ip"].as_str()?.to_string(),
                })
            })
            .collect())
    }
}

impl HetznerDriver {
    fn ip_of(&self, server_id: &str) -> Result<String, CloudError> {
        self.list()?
            .into_iter()
            .find(|s| s.server_id == server_id)
            .map(|s| s.ip)
            .ok_or_else(|| CloudError::DestroyFailed(format!("server {server_id} not found")))
    }

    fn ssh_exec(
        &self,
        server_id: &str,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<super::process::ExecOutput, CloudError> {
        let ip = self.ip_of(server_id)?;
        let argv = vec![
            "ssh".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            self.ssh_target(&ip),
            cmd.to_string(),
        ];
        run_capture(&argv, timeout).map_err(CloudError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_without_token_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        std::env::remove_var("HCLOUD_TOKEN");
        let mut driver = HetznerDriver::new(dir.path().join("hetzner.json"));
        assert!(matches!(driver.authenticate(), Err(CloudError::Auth)));
    }
}
