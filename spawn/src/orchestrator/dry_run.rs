//! Dry-run preview: a tabular summary of agent metadata, cloud metadata,
//! script source URL, environment-variable template, credential readiness
//! per required var, and prompt preview.
use crate::credentials::{load_bundle, resolve_var};
use crate::manifest::{AgentDef, CloudDef};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct CredentialReadiness {
    pub var: String,
    pub set: bool,
    pub help_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DryRunPreview {
    pub agent: AgentDef,
    pub cloud: CloudDef,
    pub script_source_url: String,
    pub environment_template: Vec<String>,
    pub credential_readiness: Vec<CredentialReadiness>,
    pub prompt_preview: Option<String>,
}

pub fn build(
    agent: &AgentDef,
    cloud: &CloudDef,
    cloud_credential_path: &Path,
    required_vars: &[String],
    prompt: Option<&str>,
) -> DryRunPreview {
    let bundle = load_bundle(cloud_credential_path);
    let readiness = required_vars
        .iter()
        .map(|var| CredentialReadiness {
            var: var.clone(),
            set: resolve_var(var, &bundle).is_some(),
            help_url: Some(cloud.homepage.clone()),
        })
        .collect();
    DryRunPreview {
        agent: agent.clone(),
        cloud: cloud.clone(),
        script_source_url: cloud.homepage.clone(),
        environment_template: agent
            .environment_template
            .clone()
            .map(|tpl| tpl.keys().cloned().collect())
            .unwrap_or_default(),
        credential_readiness: readiness,
        prompt_preview: prompt.map(|p| p.to_string()),
    }
}
