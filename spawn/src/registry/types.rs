//! The spawn record data model and its field-by-field validation,
//! re-applied on every write and every reconnect since a record is about
//! to be placed on a command line.
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

const MAX_NAME_LEN: usize = 128;
const MAX_PROMPT_LEN: usize = 4096;
const MAX_LAUNCH_CMD_LEN: usize = 512;

fn ipv4_or_dns_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$|^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap()
    })
}

const SENTINEL_IPS: &[&str] = &["sprite-console", "daytona-sandbox"];

fn user_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").unwrap())
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap())
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
}

/// Shell metacharacters the launch command is not allowed to contain,
/// outside the small allow list of pipe/redirect tokens legitimate launch
/// commands use. Every identifier is re-validated before being placed on
/// a command line.
const LAUNCH_CMD_DISALLOWED: &[char] = &[';', '`', '$', '\n', '\r', '&', '<', '>'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordValidationError {
    #[error("name `{0}` is not a kebab-case identifier of at most 128 characters")]
    Name(String),
    #[error("prompt exceeds the {MAX_PROMPT_LEN}-character limit")]
    PromptTooLong,
    #[error("prompt contains a disallowed control character")]
    PromptControlChar,
    #[error("ip `{0}` is neither a valid IPv4/DNS-label address nor a known sentinel")]
    Ip(String),
    #[error("user `{0}` does not match ^[a-z_][a-z0-9_-]{{0,31}}$")]
    User(String),
    #[error("server_id `{0}` contains disallowed characters")]
    ServerId(String),
    #[error("server_name `{0}` contains disallowed characters")]
    ServerName(String),
    #[error("launch_cmd exceeds the {MAX_LAUNCH_CMD_LEN}-character limit or contains a disallowed character")]
    LaunchCmd,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub ip: String,
    pub user: String,
    pub server_id: String,
    pub server_name: String,
    pub cloud: String,
    pub launch_cmd: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Connection {
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if !ipv4_or_dns_label_re().is_match(&self.ip) && !SENTINEL_IPS.contains(&self.ip.as_str()) {
            return Err(RecordValidationError::Ip(self.ip.clone()));
        }
        if !user_re().is_match(&self.user) {
            return Err(RecordValidationError::User(self.user.clone()));
        }
        if !identifier_re().is_match(&self.server_id) {
            return Err(RecordValidationError::ServerId(self.server_id.clone()));
        }
        if !identifier_re().is_match(&self.server_name) {
            return Err(RecordValidationError::ServerName(self.server_name.clone()));
        }
        if self.launch_cmd.is_empty()
            || self.launch_cmd.len() > MAX_LAUNCH_CMD_LEN
            || self.launch_cmd.chars().any(|c| LAUNCH_CMD_DISALLOWED.contains(&c))
        {
            return Err(RecordValidationError::LaunchCmd);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpawnRecord {
    pub agent: String,
    pub cloud: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub connection: Option<Connection>,
}

impl SpawnRecord {
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if let Some(name) = &self.name {
            if name.len() > MAX_NAME_LEN || !name_re().is_match(name) {
                return Err(RecordValidationError::Name(name.clone()));
            }
        }
        if let Some(prompt) = &self.prompt {
            if prompt.len() > MAX_PROMPT_LEN {
                return Err(RecordValidationError::PromptTooLong);
            }
            if prompt.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
                return Err(RecordValidationError::PromptControlChar);
            }
        }
        if let Some(connection) = &self.connection {
            connection.validate()?;
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(&self.connection, Some(c) if !c.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection {
            ip: "203.0.113.10".to_string(),
            user: "root".to_string(),
            server_id: "12345".to_string(),
            server_name: "spawn-abcde".to_string(),
            cloud: "hetzner".to_string(),
            launch_cmd: "claude".to_string(),
            deleted: false,
            metadata: None,
        }
    }

    fn record() -> SpawnRecord {
        SpawnRecord {
            agent: "claude".to_string(),
            cloud: "hetzner".to_string(),
            timestamp: Utc::now(),
            name: Some("my-box".to_string()),
            prompt: None,
            connection: Some(connection()),
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(record().validate().is_ok());
    }

    #[test]
    fn sentinel_ip_is_accepted() {
        let mut r = record();
        r.connection.as_mut().unwrap().ip = "sprite-console".to_string();
        assert!(r.validate().is_ok());
    }

    #[test]
    fn launch_cmd_rejects_shell_metacharacters() {
        let mut r = record();
        r.connection.as_mut().unwrap().launch_cmd = "claude; rm -rf /".to_string();
        assert_eq!(r.validate(), Err(RecordValidationError::LaunchCmd));
    }

    #[test]
    fn name_rejects_uppercase() {
        let mut r = record();
        r.name = Some("My-Box".to_string());
        assert_eq!(r.validate(), Err(RecordValidationError::Name("My-Box".to_string())));
    }

    #[test]
    fn prompt_rejects_control_characters() {
        let mut r = record();
        r.prompt = Some("hello\u{7}world".to_string());
        assert_eq!(r.validate(), Err(RecordValidationError::PromptControlChar));
    }

    #[test]
    fn is_active_false_once_deleted() {
        let mut r = record();
        r.connection.as_mut().unwrap().deleted = true;
        assert!(!r.is_active());
    }
}
