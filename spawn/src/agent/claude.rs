//! Claude Code installer.
use super::{AgentInstaller, InstallError};
use crate::cloud::{CloudDriver, CloudError};
use crate::manifest::CloudInitTier;
use richenv::{EnvVarKey, EnvVarValue, EnvVars};

#[derive(Default)]
pub struct ClaudeInstaller;

impl AgentInstaller for ClaudeInstaller {
    fn required_tier(&self) -> CloudInitTier {
        CloudInitTier::Full
    }

    fn install_steps(&self) -> Vec<String> {
        vec![
            "curl -fsSL https://claude.ai/install.sh | bash".to_string(),
            "claude --version".to_string(),
        ]
    }

    fn environment(&self, api_key: &str, _model: Option<&str>) -> Result<EnvVars, InstallError> {
        let env = EnvVars::default()
            .with_var(EnvVarKey::new("OPENROUTER_API_KEY")?, EnvVarValue::new(api_key)?)
            .with_var(
                EnvVarKey::new("ANTHROPIC_BASE_URL")?,
                EnvVarValue::new("https://openrouter.ai/api/v1")?,
            );
        Ok(env)
    }

    fn configure_hook(&self, driver: &dyn CloudDriver, server_id: &str) -> Result<(), CloudError> {
        let write_settings = "mkdir -p ~/.claude && printf '{}' > ~/.claude/settings.json";
        driver.run(server_id, write_settings, None)?;
        Ok(())
    }

    fn launch_command(&self) -> String {
        "claude".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_includes_openrouter_key() {
        let installer = ClaudeInstaller::default();
        let env = installer.environment("sk-or-v1.abc", None).unwrap();
        assert_eq!(env.len(), 2);
    }
}
