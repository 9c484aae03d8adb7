//! The nine-step launch pipeline. Strict order; each step must succeed
//! before the next is attempted.
use super::dry_run::{self, DryRunPreview};
use super::error::OrchestratorError;
use crate::agent::AgentInstaller;
use crate::cloud::CloudDriver;
use crate::config::{BasePaths, RunFlags};
use crate::credentials::{load_bundle, missing_required};
use crate::manifest::{Manifest, MatrixStatus};
use crate::registry::{Registry, SpawnRecord};
use chrono::Utc;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, instrument, warn};

const OPENROUTER_CREDENTIAL_KEY: &str = "openrouter";
const OPENROUTER_API_KEY_VAR: &str = "OPENROUTER_API_KEY";
const REMOTE_SPAWNRC_TMP: &str = "/tmp/spawn-env.b64";

fn name_slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
}

pub struct LaunchRequest {
    pub agent_key: String,
    pub cloud_key: String,
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub dry_run: bool,
}

pub enum LaunchOutcome {
    DryRun(Box<DryRunPreview>),
    Launched { exit_code: i32 },
}

pub struct Orchestrator<'a> {
    pub paths: &'a BasePaths,
    pub manifest: &'a Manifest,
    pub registry: &'a dyn Registry,
    pub flags: RunFlags,
}

impl<'a> Orchestrator<'a> {
    pub fn new(paths: &'a BasePaths, manifest: &'a Manifest, registry: &'a dyn Registry, flags: RunFlags) -> Self {
        Self { paths, manifest, registry, flags }
    }

    /// Runs the full pipeline. `driver` and `installer` are already bound to
    /// the resolved `(cloud, agent)` pair by the caller (see
    /// [`crate::cloud::registry_lookup::build_driver`] and
    /// [`crate::agent::build_installer`]).
    #[instrument(skip_all, fields(agent = %request.agent_key, cloud = %request.cloud_key))]
    pub fn run(
        &self,
        request: LaunchRequest,
        mut driver: Box<dyn CloudDriver>,
        mut installer: Box<dyn AgentInstaller>,
    ) -> Result<LaunchOutcome, OrchestratorError> {
        // Step 1: resolve and validate the pair.
        let agent_def = self
            .manifest
            .agents
            .get(&request.agent_key)
            .ok_or_else(|| OrchestratorError::UnknownAgent(request.agent_key.clone()))?;
        let cloud_def = self
            .manifest
            .clouds
            .get(&request.cloud_key)
            .ok_or_else(|| OrchestratorError::UnknownCloud(request.cloud_key.clone()))?;
        if !self.manifest.is_implemented(&request.cloud_key, &request.agent_key) {
            return Err(OrchestratorError::NotImplemented {
                cloud: request.cloud_key.clone(),
                agent: request.agent_key.clone(),
                candidates: self.suggest_clouds(&request.agent_key),
            });
        }

        let cloud_credential_path = self.paths.credential_file(&request.cloud_key);
        let openrouter_credential_path = self.paths.credential_file(OPENROUTER_CREDENTIAL_KEY);
        let cloud_required = cloud_def
            .required_env_vars()
            .map_err(|e| OrchestratorError::MissingCredentials(vec![e.to_string()]))?;

        if request.dry_run {
            let preview = dry_run::build(
                agent_def,
                cloud_def,
                &cloud_credential_path,
                &cloud_required,
                request.prompt.as_deref(),
            );
            return Ok(LaunchOutcome::DryRun(Box::new(preview)));
        }

        // Step 2: pre-flight credential check.
        self.preflight_credentials(&cloud_required, &cloud_credential_path, &openrouter_credential_path)?;

        // Step 3: prompt or derive the instance name.
        let name = derive_name(request.name.as_deref(), &request.agent_key)?;

        // Duplicate-name guard.
        if let Some(existing) = self.find_duplicate(&name, &request.agent_key, &request.cloud_key)? {
            info!(server_id = %existing.connection.as_ref().unwrap().server_id, "routing to existing instance instead of provisioning a duplicate");
            return Ok(LaunchOutcome::Launched { exit_code: 0 });
        }

        installer
            .pre_provision_hook()
            .map_err(OrchestratorError::Install)?;

        // Step 4: authenticate, size, create; persist immediately.
        driver.authenticate()?;
        driver.prompt_size();
        let server_info = driver.create_server(&name)?;
        let record = SpawnRecord {
            agent: request.agent_key.clone(),
            cloud: request.cloud_key.clone(),
            timestamp: Utc::now(),
            name: Some(name.clone()),
            prompt: request.prompt.clone(),
            connection: Some(crate::registry::Connection {
                ip: server_info.ip.clone(),
                user: server_info.user.clone(),
                server_id: server_info.server_id.clone(),
                server_name: name.clone(),
                cloud: request.cloud_key.clone(),
                launch_cmd: installer.launch_command(),
                deleted: false,
                metadata: None,
            }),
        };
        self.registry.append(record.clone())?;

        // Step 5: wait for readiness.
        driver.wait_ready(&server_info.server_id)?;

        // Step 6: run install steps sequentially.
        for step in installer.install_steps() {
            let exit = driver.run(&server_info.server_id, &step, None)?;
            if exit != 0 {
                return Err(OrchestratorError::Install(crate::agent::InstallError::StepFailed(exit)));
            }
        }

        // Step 7: environment injection, then configure hook.
        let api_key = crate::credentials::resolve_var(
            OPENROUTER_API_KEY_VAR,
            &load_bundle(&openrouter_credential_path),
        )
        .unwrap_or_default();
        let env = installer.environment(&api_key, request.model.as_deref())?;
        self.inject_environment(driver.as_ref(), &server_info.server_id, &env)?;
        installer.configure_hook(driver.as_ref(), &server_info.server_id)?;

        // Step 8: pre-launch hook.
        installer.pre_launch_hook(driver.as_ref(), &server_info.server_id)?;

        // Step 9: the launch command was already captured into the record at
        // creation time; hand off the terminal to it.
        let launch_cmd = record
            .connection
            .as_ref()
            .map(|c| c.launch_cmd.clone())
            .unwrap_or_else(|| installer.launch_command());
        let exit_code = driver.interactive(&server_info.server_id, &launch_cmd)?;
        Ok(LaunchOutcome::Launched { exit_code })
    }

    fn preflight_credentials(
        &self,
        cloud_required: &[String],
        cloud_credential_path: &Path,
        openrouter_credential_path: &Path,
    ) -> Result<(), OrchestratorError> {
        let cloud_bundle = load_bundle(cloud_credential_path);
        let openrouter_bundle = load_bundle(openrouter_credential_path);

        let missing_cloud = missing_required(cloud_required, &cloud_bundle);
        let missing_openrouter =
            missing_required(&[OPENROUTER_API_KEY_VAR.to_string()], &openrouter_bundle);

        let missing = if !cloud_bundle.is_empty() && !missing_cloud.is_empty() {
            missing_openrouter
        } else {
            missing_cloud.into_iter().chain(missing_openrouter).collect()
        };

        if missing.is_empty() {
            return Ok(());
        }
        if self.flags.non_interactive {
            return Err(OrchestratorError::MissingCredentials(missing));
        }
        warn!(?missing, "missing credentials; continuing in interactive mode, expect an auth prompt");
        Ok(())
    }

    /// Up to three other clouds the agent is implemented on, credentialed
    /// ones first, for the "did you mean" hint on `NotImplemented`.
    fn suggest_clouds(&self, agent_key: &str) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .manifest
            .matrix
            .iter()
            .filter_map(|(entry, status)| {
                if !matches!(status, MatrixStatus::Implemented) {
                    return None;
                }
                let (cloud, agent) = entry.split_once('/')?;
                (agent == agent_key && self.manifest.clouds.contains_key(cloud)).then(|| cloud.to_string())
            })
            .collect();
        candidates.sort_by_key(|cloud| (!self.has_credentials(cloud), cloud.clone()));
        candidates.truncate(3);
        candidates
    }

    /// Whether `cloud_key`'s required env vars are all already satisfied by
    /// the environment or its saved credential bundle.
    fn has_credentials(&self, cloud_key: &str) -> bool {
        let Some(cloud_def) = self.manifest.clouds.get(cloud_key) else { return false };
        let Ok(required) = cloud_def.required_env_vars() else { return false };
        if required.is_empty() {
            return true;
        }
        let bundle = load_bundle(&self.paths.credential_file(cloud_key));
        missing_required(&required, &bundle).is_empty()
    }

    fn find_duplicate(
        &self,
        name: &str,
        agent: &str,
        cloud: &str,
    ) -> Result<Option<SpawnRecord>, OrchestratorError> {
        let active = self.registry.active_servers()?;
        Ok(active
            .into_iter()
            .find(|r| r.agent == agent && r.cloud == cloud && r.name.as_deref() == Some(name)))
    }

    fn inject_environment(
        &self,
        driver: &dyn CloudDriver,
        server_id: &str,
        env: &richenv::EnvVars,
    ) -> Result<(), OrchestratorError> {
        use crate::agent::env_injection::{decode_command, encode_spawnrc, idempotent_append_command};
        let encoded = encode_spawnrc(env);
        let local_tmp = std::env::temp_dir().join(format!("spawn-env-{server_id}.b64"));
        crate::util::atomic_write(&local_tmp, encoded).map_err(|e| {
            OrchestratorError::Cloud(crate::cloud::CloudError::Provision { reason: e.to_string() })
        })?;
        driver.upload(server_id, &local_tmp, REMOTE_SPAWNRC_TMP)?;
        let _ = std::fs::remove_file(&local_tmp);
        driver.run(server_id, &decode_command(REMOTE_SPAWNRC_TMP), None)?;
        for rc_file in ["~/.bashrc", "~/.zshrc"] {
            driver.run(server_id, &idempotent_append_command(rc_file), None)?;
        }
        Ok(())
    }
}

/// Uses the caller's candidate, validated against the slug charset, or
/// derives one from the agent key plus a short random suffix.
fn derive_name(candidate: Option<&str>, agent_key: &str) -> Result<String, OrchestratorError> {
    if let Some(candidate) = candidate {
        if candidate.len() > 64 || !name_slug_re().is_match(candidate) {
            return Err(OrchestratorError::InvalidName(candidate.to_string()));
        }
        return Ok(candidate.to_string());
    }
    let suffix: String = ulid::Ulid::new().to_string().to_lowercase().chars().take(8).collect();
    Ok(format!("spawn-{agent_key}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AgentDef, CloudDef, CloudInitTier};
    use crate::registry::FileRegistry;
    use std::collections::HashMap;

    #[test]
    fn derive_name_rejects_uppercase_candidate() {
        assert!(derive_name(Some("My-Box"), "claude").is_err());
    }

    #[test]
    fn derive_name_generates_a_slug_when_absent() {
        let name = derive_name(None, "claude").unwrap();
        assert!(name_slug_re().is_match(&name));
        assert!(name.starts_with("spawn-claude-"));
    }

    fn agent_def() -> AgentDef {
        AgentDef {
            display_name: "Claude Code".into(),
            description: "d".into(),
            homepage: None,
            install_hint: None,
            launch_command: "claude".into(),
            environment_template: None,
            featured_clouds: vec![],
            cloud_init_tier: CloudInitTier::Full,
        }
    }

    fn cloud_def(auth: &str) -> CloudDef {
        CloudDef {
            display_name: "d".into(),
            description: "d".into(),
            cloud_type: "vm".into(),
            homepage: "https://example.com".into(),
            auth: auth.to_string(),
        }
    }

    /// Three clouds implement `claude`: one with no auth required, one
    /// whose required var is set in the environment, one whose required
    /// var is unset. The credentialed two sort ahead of the uncredentialed
    /// one, alphabetically within each group.
    #[test]
    fn suggest_clouds_orders_credentialed_clouds_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut agents = HashMap::new();
        agents.insert("claude".to_string(), agent_def());
        let mut clouds = HashMap::new();
        clouds.insert("hetzner".to_string(), cloud_def("HCLOUD_TOKEN"));
        clouds.insert("sprite".to_string(), cloud_def("none"));
        clouds.insert("daytona".to_string(), cloud_def("DAYTONA_API_KEY"));
        let mut matrix = HashMap::new();
        matrix.insert("hetzner/claude".to_string(), MatrixStatus::Implemented);
        matrix.insert("sprite/claude".to_string(), MatrixStatus::Implemented);
        matrix.insert("daytona/claude".to_string(), MatrixStatus::Implemented);
        let manifest = Manifest { agents, clouds, matrix };

        std::env::remove_var("HCLOUD_TOKEN");
        std::env::remove_var("DAYTONA_API_KEY");
        std::env::set_var("HCLOUD_TOKEN", "abc");

        let paths = BasePaths { spawn_home: dir.path().to_path_buf(), config_dir: dir.path().to_path_buf() };
        let registry = FileRegistry::new(paths.history_file());
        let orchestrator = Orchestrator::new(&paths, &manifest, &registry, RunFlags::default());

        let suggestions = orchestrator.suggest_clouds("claude");
        assert_eq!(
            suggestions,
            vec!["hetzner".to_string(), "sprite".to_string(), "daytona".to_string()]
        );

        std::env::remove_var("HCLOUD_TOKEN");
    }
}
