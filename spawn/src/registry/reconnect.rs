//! Reconnect: open an interactive session against an existing record,
//! re-validating every identifier first since it is about to be placed on
//! a command line.
use super::store::RegistryError;
use super::types::SpawnRecord;
use crate::cloud::{CloudDriver, CloudError};
use std::path::Path;

/// The three session shapes a reconnect can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectKind {
    DirectSsh { user: String, ip: String },
    SentinelConsole { ip: String, server_name: String },
    Tunnel { launch_cmd: String },
}

const SENTINEL_IPS: &[&str] = &["sprite-console", "daytona-sandbox"];

pub fn classify(record: &SpawnRecord) -> Option<ReconnectKind> {
    let connection = record.connection.as_ref()?;
    if SENTINEL_IPS.contains(&connection.ip.as_str()) {
        return Some(ReconnectKind::SentinelConsole {
            ip: connection.ip.clone(),
            server_name: connection.server_name.clone(),
        });
    }
    if connection.launch_cmd.contains("tunnel") {
        return Some(ReconnectKind::Tunnel { launch_cmd: connection.launch_cmd.clone() });
    }
    Some(ReconnectKind::DirectSsh { user: connection.user.clone(), ip: connection.ip.clone() })
}

/// Re-validates `record` against the history file at `history_path` before
/// handing it to the driver; a failed validation aborts with a
/// tampered-history diagnostic pointing at the file path.
pub fn reconnect(
    record: &SpawnRecord,
    history_path: &Path,
    driver: &dyn CloudDriver,
) -> Result<i32, RegistryError> {
    record.validate().map_err(|reason| RegistryError::Tampered {
        path: history_path.to_path_buf(),
        reason: reason.to_string(),
    })?;
    let connection = record
        .connection
        .as_ref()
        .ok_or(RegistryError::NotFound)?;
    let exit_code = driver
        .interactive(&connection.server_id, &connection.launch_cmd)
        .map_err(|err: CloudError| RegistryError::Tampered {
            path: history_path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::Connection;
    use chrono::Utc;

    fn record_with(ip: &str, launch_cmd: &str) -> SpawnRecord {
        SpawnRecord {
            agent: "claude".to_string(),
            cloud: "sprite".to_string(),
            timestamp: Utc::now(),
            name: None,
            prompt: None,
            connection: Some(Connection {
                ip: ip.to_string(),
                user: "root".to_string(),
                server_id: "1".to_string(),
                server_name: "spawn-abc".to_string(),
                cloud: "sprite".to_string(),
                launch_cmd: launch_cmd.to_string(),
                deleted: false,
                metadata: None,
            }),
        }
    }

    #[test]
    fn sentinel_ip_classifies_as_console() {
        let record = record_with("sprite-console", "claude");
        assert_eq!(
            classify(&record),
            Some(ReconnectKind::SentinelConsole {
                ip: "sprite-console".to_string(),
                server_name: "spawn-abc".to_string(),
            })
        );
    }

    #[test]
    fn plain_ip_classifies_as_direct_ssh() {
        let record = record_with("203.0.113.10", "claude");
        assert_eq!(
            classify(&record),
            Some(ReconnectKind::DirectSsh { user: "root".to_string(), ip: "203.0.113.10".to_string() })
        );
    }
}
