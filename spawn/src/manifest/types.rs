//! The manifest's data model.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
}

fn auth_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]{3,}$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudInitTier {
    Minimal,
    Full,
    Heavy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub install_hint: Option<String>,
    pub launch_command: String,
    #[serde(default)]
    pub environment_template: Option<HashMap<String, String>>,
    #[serde(default)]
    pub featured_clouds: Vec<String>,
    pub cloud_init_tier: CloudInitTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudDef {
    pub display_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub cloud_type: String,
    pub homepage: String,
    /// `"none"` or a `+`-joined list of required env var names.
    pub auth: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid auth string `{0}`: variable names must match ^[A-Z][A-Z0-9_]{{3,}}$")]
pub struct AuthParseError(pub String);

impl CloudDef {
    /// Parses `auth` into the list of required environment variable names.
    /// `"none"` and any string not starting with an uppercase letter yield
    /// an empty list: `"foo"` (lowercase) yields `[]`.
    pub fn required_env_vars(&self) -> Result<Vec<String>, AuthParseError> {
        let trimmed = self.auth.trim();
        if trimmed.eq_ignore_ascii_case("none") {
            return Ok(Vec::new());
        }
        let mut vars = Vec::new();
        for part in trimmed.split('+') {
            let name = part.trim();
            if name.is_empty() {
                continue;
            }
            if !auth_var_regex().is_match(name) {
                if name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
                    return Ok(Vec::new());
                }
                return Err(AuthParseError(self.auth.clone()));
            }
            vars.push(name.to_string());
        }
        Ok(vars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixStatus {
    Implemented,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub agents: HashMap<String, AgentDef>,
    pub clouds: HashMap<String, CloudDef>,
    /// Keyed `"cloud/agent"`.
    pub matrix: HashMap<String, MatrixStatus>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestValidationError {
    #[error("manifest key `{0}` is not a valid kebab-case identifier")]
    InvalidKey(String),
    #[error("matrix entry `{0}` is not in the form cloud/agent")]
    MalformedMatrixKey(String),
    #[error("matrix entry `{entry}` references unknown cloud `{cloud}`")]
    UnknownCloud { entry: String, cloud: String },
    #[error("matrix entry `{entry}` references unknown agent `{agent}`")]
    UnknownAgent { entry: String, agent: String },
    #[error(transparent)]
    Auth(#[from] AuthParseError),
}

impl Manifest {
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        for key in self.agents.keys().chain(self.clouds.keys()) {
            if !key_regex().is_match(key) || !(2..=32).contains(&key.len()) {
                return Err(ManifestValidationError::InvalidKey(key.clone()));
            }
        }
        for cloud in self.clouds.values() {
            cloud.required_env_vars()?;
        }
        for entry in self.matrix.keys() {
            let (cloud, agent) = entry
                .split_once('/')
                .ok_or_else(|| ManifestValidationError::MalformedMatrixKey(entry.clone()))?;
            if !self.clouds.contains_key(cloud) {
                return Err(ManifestValidationError::UnknownCloud {
                    entry: entry.clone(),
                    cloud: cloud.to_string(),
                });
            }
            if !self.agents.contains_key(agent) {
                return Err(ManifestValidationError::UnknownAgent {
                    entry: entry.clone(),
                    agent: agent.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_implemented(&self, cloud: &str, agent: &str) -> bool {
        matches!(
            self.matrix.get(&format!("{cloud}/{agent}")),
            Some(MatrixStatus::Implemented)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(auth: &str) -> CloudDef {
        CloudDef {
            display_name: "Hetzner".into(),
            description: "d".into(),
            cloud_type: "vm".into(),
            homepage: "https://example.com".into(),
            auth: auth.to_string(),
        }
    }

    #[test]
    fn auth_string_none_yields_empty() {
        assert_eq!(cloud("none").required_env_vars().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn auth_string_plus_joined_splits_and_trims() {
        assert_eq!(
            cloud("FOO + BAR").required_env_vars().unwrap(),
            vec!["FOO".to_string(), "BAR".to_string()]
        );
    }

    #[test]
    fn auth_string_lowercase_yields_empty() {
        assert_eq!(cloud("foo").required_env_vars().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn matrix_entry_requires_known_cloud_and_agent() {
        let mut agents = HashMap::new();
        agents.insert(
            "claude".to_string(),
            AgentDef {
                display_name: "Claude Code".into(),
                description: "d".into(),
                homepage: None,
                install_hint: None,
                launch_command: "claude".into(),
                environment_template: None,
                featured_clouds: vec![],
                cloud_init_tier: CloudInitTier::Full,
            },
        );
        let mut clouds = HashMap::new();
        clouds.insert("hetzner".to_string(), cloud("HCLOUD_TOKEN"));
        let mut matrix = HashMap::new();
        matrix.insert("hetzner/claude".to_string(), MatrixStatus::Implemented);
        matrix.insert("fictitious/claude".to_string(), MatrixStatus::Missing);

        let manifest = Manifest { agents, clouds, matrix };
        assert_eq!(
            manifest.validate(),
            Err(ManifestValidationError::UnknownCloud {
                entry: "fictitious/claude".to_string(),
                cloud: "fictitious".to_string(),
            })
        );
    }
}
