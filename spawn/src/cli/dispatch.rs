//! Resolves user intent and drives the rest of the crate: interactive
//! picker, direct launch, list, destroy, rerun, matrix.
use super::args::Cli;
use crate::agent::build_installer;
use crate::agent::generic::GenericInstaller;
use crate::cloud::registry_lookup::build_driver;
use crate::config::{BasePaths, RunFlags};
use crate::error::SpawnError;
use crate::headless::{self, ConnectionInfo, OutputFormat};
use crate::manifest::{Kind, Manifest};
use crate::orchestrator::{LaunchOutcome, LaunchRequest, Orchestrator};
use crate::registry::{reconnect, FileRegistry, Registry};
use std::io::Write;
use tracing::{error, info};

const RESERVED_SUBCOMMANDS: &[&str] =
    &["list", "delete", "last", "matrix", "agents", "clouds", "update", "version", "help", "pick"];

pub struct Dispatcher {
    pub paths: BasePaths,
    pub manifest: Manifest,
    pub registry: FileRegistry,
}

impl Dispatcher {
    pub fn new(paths: BasePaths, manifest: Manifest) -> Self {
        let registry = FileRegistry::new(paths.history_file());
        Self { paths, manifest, registry }
    }

    pub fn dispatch(&self, cli: &Cli) -> Result<i32, SpawnError> {
        match cli.agent_or_command.as_deref() {
            None => self.picker(None),
            Some(word) if RESERVED_SUBCOMMANDS.contains(&word) => self.subcommand(word, cli),
            Some(agent) if cli.cloud.is_none() => self.picker(Some(agent)),
            Some(agent) => self.launch(cli, agent, cli.cloud.as_deref().unwrap()),
        }
    }

    fn subcommand(&self, word: &str, cli: &Cli) -> Result<i32, SpawnError> {
        match word {
            "list" => self.list(cli.agent.as_deref(), cli.cloud_filter.as_deref(), cli.clear),
            "delete" => self.delete(cli.agent.as_deref(), cli.cloud_filter.as_deref()),
            "last" => self.last(),
            "matrix" => self.matrix(),
            "agents" => self.agents(),
            "clouds" => self.clouds(),
            "update" => self.update(),
            "version" => self.version(),
            "help" => self.help(),
            "pick" => self.pick(cli),
            other => unreachable!("reserved subcommand list and match arms drifted apart: {other}"),
        }
    }

    /// The argument-parser and TUI chrome of the interactive picker are
    /// external collaborators per spec's Non-goals; this resolves as far
    /// as the core's own contract goes: print the candidate set to stderr
    /// and defer the actual choice to the caller's shell wrapper.
    fn picker(&self, agent_filter: Option<&str>) -> Result<i32, SpawnError> {
        let agents: Vec<&str> = self
            .manifest
            .agents
            .keys()
            .map(String::as_str)
            .filter(|key| agent_filter.is_none_or(|filter| *key == filter))
            .collect();
        eprintln!("available agents: {}", agents.join(", "));
        for agent in &agents {
            let mut clouds: Vec<&str> = Vec::new();
            for entry in self.manifest.matrix.keys() {
                let Some((cloud, entry_agent)) = entry.split_once('/') else { continue };
                if entry_agent == *agent && self.manifest.clouds.contains_key(cloud) {
                    clouds.push(cloud);
                }
            }
            eprintln!("  {agent}: {}", clouds.join(", "));
        }
        Ok(0)
    }

    fn launch(&self, cli: &Cli, agent_key: &str, cloud_key: &str) -> Result<i32, SpawnError> {
        let agent_suggestion = self.manifest.resolve(agent_key, Kind::Agent);
        let cloud_suggestion = self.manifest.resolve(cloud_key, Kind::Cloud);
        let swapped = agent_suggestion.as_ref().is_some_and(|s| s.kind == Kind::Cloud)
            || cloud_suggestion.as_ref().is_some_and(|s| s.kind == Kind::Agent);

        let (resolved_agent, resolved_cloud) = if swapped {
            eprintln!(
                "it looks like you swapped the agent and cloud arguments; running `spawn {cloud_key} {agent_key}` instead"
            );
            let resolved_agent = self
                .manifest
                .resolve(cloud_key, Kind::Agent)
                .map(|s| s.key)
                .unwrap_or_else(|| cloud_key.to_string());
            let resolved_cloud = self
                .manifest
                .resolve(agent_key, Kind::Cloud)
                .map(|s| s.key)
                .unwrap_or_else(|| agent_key.to_string());
            (resolved_agent, resolved_cloud)
        } else {
            let resolved_agent = agent_suggestion.map(|s| s.key).unwrap_or_else(|| agent_key.to_string());
            let resolved_cloud = cloud_suggestion.map(|s| s.key).unwrap_or_else(|| cloud_key.to_string());
            (resolved_agent, resolved_cloud)
        };

        let driver = build_driver(&resolved_cloud, &self.paths)
            .ok_or_else(|| crate::orchestrator::OrchestratorError::UnknownCloud(resolved_cloud.clone()))?;
        let installer: Box<dyn crate::agent::AgentInstaller> = match build_installer(&resolved_agent) {
            Some(installer) => installer,
            None => match self.manifest.agents.get(&resolved_agent) {
                Some(def) => Box::new(GenericInstaller::from_def(def)),
                None => {
                    return Err(crate::orchestrator::OrchestratorError::UnknownAgent(resolved_agent.clone()).into())
                }
            },
        };

        let prompt = cli.resolved_prompt().map_err(|err| SpawnError::Validation(err.to_string()))?;
        let flags = RunFlags::from_env();
        let orchestrator = Orchestrator::new(&self.paths, &self.manifest, &self.registry, flags);
        let request = LaunchRequest {
            agent_key: resolved_agent.clone(),
            cloud_key: resolved_cloud.clone(),
            name: cli.name.clone(),
            prompt,
            model: None,
            dry_run: cli.dry_run,
        };

        let outcome = orchestrator.run(request, driver, installer);
        if cli.headless {
            return Ok(self.emit_headless(cli, &resolved_cloud, &resolved_agent, outcome));
        }

        match outcome {
            Ok(LaunchOutcome::DryRun(preview)) => {
                println!("{preview:#?}");
                Ok(0)
            }
            Ok(LaunchOutcome::Launched { exit_code }) => Ok(exit_code),
            Err(err) => {
                error!(%err, "launch failed");
                Err(err.into())
            }
        }
    }

    fn emit_headless(
        &self,
        cli: &Cli,
        cloud: &str,
        agent: &str,
        outcome: Result<LaunchOutcome, crate::orchestrator::OrchestratorError>,
    ) -> i32 {
        let format = OutputFormat::from_flag(cli.output.as_deref());
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        match outcome {
            Ok(LaunchOutcome::DryRun(_)) => headless::emit(&mut out, format, cloud, agent, Ok(&ConnectionInfo::default())),
            Ok(LaunchOutcome::Launched { .. }) => {
                let info = self.last_connection_info().unwrap_or_default();
                headless::emit(&mut out, format, cloud, agent, Ok(&info))
            }
            Err(err) => {
                let err: SpawnError = err.into();
                headless::emit(&mut out, format, cloud, agent, Err(&err))
            }
        }
    }

    fn last_connection_info(&self) -> Option<ConnectionInfo> {
        let active = self.registry.active_servers().ok()?;
        let record = active.into_iter().next()?;
        let connection = record.connection?;
        Some(ConnectionInfo {
            ip_address: Some(connection.ip),
            ssh_user: Some(connection.user),
            server_id: Some(connection.server_id),
            server_name: Some(connection.server_name),
        })
    }

    fn list(&self, agent: Option<&str>, cloud: Option<&str>, clear: bool) -> Result<i32, SpawnError> {
        if clear {
            for record in self.registry.filter(agent, cloud)? {
                if let Some(connection) = record.connection {
                    let _ = self.registry.remove(&connection.server_id);
                }
            }
            return Ok(0);
        }
        for record in self.registry.filter(agent, cloud)? {
            if let Some(connection) = &record.connection {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.timestamp.to_rfc3339(),
                    record.agent,
                    record.cloud,
                    connection.server_id,
                    if connection.deleted { "deleted" } else { "active" }
                );
            }
        }
        Ok(0)
    }

    // TODO: a `--soft` flag (destroy the VM but keep the history row, marked
    // deleted, instead of requiring a separate `list --clear`) would land here.
    fn delete(&self, agent: Option<&str>, cloud: Option<&str>) -> Result<i32, SpawnError> {
        for record in self.registry.filter(agent, cloud)? {
            let Some(connection) = record.connection else { continue };
            if connection.deleted {
                continue;
            }
            let Some(driver) = build_driver(&connection.cloud, &self.paths) else { continue };
            driver.destroy(&connection.server_id)?;
            self.registry.mark_deleted(&connection.server_id)?;
            info!(server_id = %connection.server_id, "destroyed");
        }
        Ok(0)
    }

    fn last(&self) -> Result<i32, SpawnError> {
        let active = self.registry.active_servers()?;
        let Some(record) = active.into_iter().next() else {
            println!("no active servers");
            return Ok(0);
        };
        let Some(connection) = record.connection.as_ref() else {
            println!("no active servers");
            return Ok(0);
        };
        let Some(driver) = build_driver(&connection.cloud, &self.paths) else {
            return Err(crate::orchestrator::OrchestratorError::UnknownCloud(connection.cloud.clone()).into());
        };
        let exit_code = reconnect::reconnect(&record, &self.paths.history_file(), driver.as_ref())?;
        Ok(exit_code)
    }

    fn matrix(&self) -> Result<i32, SpawnError> {
        let mut keys: Vec<&String> = self.manifest.matrix.keys().collect();
        keys.sort();
        for key in keys {
            println!("{key}\t{:?}", self.manifest.matrix[key]);
        }
        Ok(0)
    }

    fn agents(&self) -> Result<i32, SpawnError> {
        let mut keys: Vec<&String> = self.manifest.agents.keys().collect();
        keys.sort();
        for key in keys {
            println!("{key}\t{}", self.manifest.agents[key].display_name);
        }
        Ok(0)
    }

    fn clouds(&self) -> Result<i32, SpawnError> {
        let mut keys: Vec<&String> = self.manifest.clouds.keys().collect();
        keys.sort();
        for key in keys {
            println!("{key}\t{}", self.manifest.clouds[key].display_name);
        }
        Ok(0)
    }

    fn update(&self) -> Result<i32, SpawnError> {
        println!("spawn is distributed via its install script; re-run that script to update.");
        Ok(0)
    }

    fn version(&self) -> Result<i32, SpawnError> {
        println!("spawn {}", env!("CARGO_PKG_VERSION"));
        Ok(0)
    }

    fn help(&self) -> Result<i32, SpawnError> {
        println!("{}", include_str!("usage.txt"));
        Ok(0)
    }

    fn pick(&self, cli: &Cli) -> Result<i32, SpawnError> {
        let prompt = cli.prompt.as_deref().unwrap_or("choose one");
        let stdin = std::io::stdin();
        let mut out = std::io::stdout().lock();
        let mut chrome = std::io::stderr().lock();
        super::pick::run(stdin.lock(), &mut out, &mut chrome, prompt, cli.default.as_deref())
            .map_err(|err| SpawnError::Validation(err.to_string()))?;
        let _ = out.flush();
        Ok(0)
    }
}
