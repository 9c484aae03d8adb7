//! Generic installer, driven entirely by a manifest [`AgentDef`], for
//! agents that need no special hooks beyond running `install_hint` and
//! launching `launch_command`.
use super::{AgentInstaller, InstallError};
use crate::manifest::{AgentDef, CloudInitTier};
use richenv::{EnvVarKey, EnvVarValue, EnvVars};

pub struct GenericInstaller {
    install_hint: Option<String>,
    launch_command: String,
    cloud_init_tier: CloudInitTier,
    env_key: String,
}

impl GenericInstaller {
    /// Builds an installer from a manifest entry. `env_key` is the
    /// environment variable name the agent reads its API key from; callers
    /// take it from `AgentDef.environment_template` when present, falling
    /// back to `OPENROUTER_API_KEY`.
    pub fn from_def(def: &AgentDef) -> Self {
        let env_key = def
            .environment_template
            .as_ref()
            .and_then(|tpl| tpl.keys().next().cloned())
            .unwrap_or_else(|| "OPENROUTER_API_KEY".to_string());
        Self {
            install_hint: def.install_hint.clone(),
            launch_command: def.launch_command.clone(),
            cloud_init_tier: def.cloud_init_tier,
            env_key,
        }
    }
}

impl AgentInstaller for GenericInstaller {
    fn required_tier(&self) -> CloudInitTier {
        self.cloud_init_tier
    }

    fn install_steps(&self) -> Vec<String> {
        match &self.install_hint {
            Some(hint) => vec![hint.clone()],
            None => Vec::new(),
        }
    }

    fn environment(&self, api_key: &str, _model: Option<&str>) -> Result<EnvVars, InstallError> {
        let env = EnvVars::default().with_var(EnvVarKey::new(&self.env_key)?, EnvVarValue::new(api_key)?);
        Ok(env)
    }

    fn launch_command(&self) -> String {
        self.launch_command.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn def() -> AgentDef {
        AgentDef {
            display_name: "Aider".into(),
            description: "d".into(),
            homepage: None,
            install_hint: Some("pipx install aider-chat".into()),
            launch_command: "aider".into(),
            environment_template: Some(HashMap::from([("OPENROUTER_API_KEY".to_string(), "".to_string())])),
            featured_clouds: vec![],
            cloud_init_tier: CloudInitTier::Minimal,
        }
    }

    #[test]
    fn install_steps_come_from_the_manifest_hint() {
        let installer = GenericInstaller::from_def(&def());
        assert_eq!(installer.install_steps(), vec!["pipx install aider-chat".to_string()]);
    }

    #[test]
    fn missing_hint_yields_no_install_steps() {
        let mut d = def();
        d.install_hint = None;
        let installer = GenericInstaller::from_def(&d);
        assert!(installer.install_steps().is_empty());
    }

    #[test]
    fn environment_uses_the_templates_key_name() {
        let installer = GenericInstaller::from_def(&def());
        let env = installer.environment("sk-or-xyz", None).unwrap();
        assert_eq!(env.len(), 1);
    }
}
