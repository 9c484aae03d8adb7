//! Codex CLI installer, run against an OpenRouter-proxied endpoint.
//! Exercises the pre-provision hook: Codex needs a model chosen from a
//! whitelist before the VM is created.
use super::{AgentInstaller, InstallError};
use crate::cloud::{CloudDriver, CloudError};
use crate::manifest::CloudInitTier;
use richenv::{EnvVarKey, EnvVarValue, EnvVars};

const MODEL_WHITELIST: &[&str] = &["gpt-4.1", "gpt-4.1-mini", "o4-mini"];
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

pub struct CodexInstaller {
    model: String,
}

impl Default for CodexInstaller {
    fn default() -> Self {
        Self { model: DEFAULT_MODEL.to_string() }
    }
}

impl AgentInstaller for CodexInstaller {
    fn required_tier(&self) -> CloudInitTier {
        CloudInitTier::Full
    }

    fn install_steps(&self) -> Vec<String> {
        vec![
            "npm install -g @openai/codex-cli".to_string(),
            "codex --version".to_string(),
        ]
    }

    fn environment(&self, api_key: &str, model: Option<&str>) -> Result<EnvVars, InstallError> {
        let model = model.unwrap_or(&self.model);
        let env = EnvVars::default()
            .with_var(EnvVarKey::new("OPENROUTER_API_KEY")?, EnvVarValue::new(api_key)?)
            .with_var(EnvVarKey::new("CODEX_MODEL")?, EnvVarValue::new(model)?)
            .with_var(
                EnvVarKey::new("OPENAI_BASE_URL")?,
                EnvVarValue::new("https://openrouter.ai/api/v1")?,
            );
        Ok(env)
    }

    /// Picks a model from `MODEL_WHITELIST`, preferring `SPAWN_MODEL` if it
    /// names a whitelisted one. This hook only owns the selection, not how
    /// it is displayed by an interactive picker.
    fn pre_provision_hook(&mut self) -> Result<(), InstallError> {
        if let Ok(requested) = std::env::var("SPAWN_MODEL") {
            if MODEL_WHITELIST.contains(&requested.as_str()) {
                self.model = requested;
            } else {
                return Err(InstallError::PreProvision(format!(
                    "model `{requested}` is not in the whitelist: {MODEL_WHITELIST:?}"
                )));
            }
        }
        Ok(())
    }

    fn pre_launch_hook(&self, driver: &dyn CloudDriver, server_id: &str) -> Result<(), CloudError> {
        driver.run(
            server_id,
            "nohup codex-gateway >/tmp/spawn-codex-gateway.log 2>&1 &",
            None,
        )?;
        Ok(())
    }

    fn launch_command(&self) -> String {
        "codex".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_model_outside_whitelist() {
        std::env::set_var("SPAWN_MODEL", "not-a-real-model");
        let mut installer = CodexInstaller::default();
        assert!(installer.pre_provision_hook().is_err());
        std::env::remove_var("SPAWN_MODEL");
    }

    #[test]
    fn accepts_whitelisted_model() {
        std::env::set_var("SPAWN_MODEL", "o4-mini");
        let mut installer = CodexInstaller::default();
        installer.pre_provision_hook().unwrap();
        assert_eq!(installer.model, "o4-mini");
        std::env::remove_var("SPAWN_MODEL");
    }
}
