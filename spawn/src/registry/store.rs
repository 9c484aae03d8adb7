//! JSON-file-backed registry: a single append-oriented JSON file, written
//! atomically, with every field revalidated on each write.
use super::types::{RecordValidationError, SpawnRecord};
use crate::manifest::resolve::{resolve, Candidate, Kind};
use crate::util::{atomic_write, AtomicWriteError};
use fs::file::reader::FileReader;
use fs::LocalFile;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse registry file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write registry file: {0}")]
    Write(#[from] AtomicWriteError),
    #[error(transparent)]
    Validation(#[from] RecordValidationError),
    #[error("registry file at {path} failed revalidation on read: {reason} (history may be tampered)")]
    Tampered { path: PathBuf, reason: String },
    #[error("no record matches the given selector")]
    NotFound,
}

/// The append/query/destroy surface the orchestrator and CLI depend on.
/// A single JSON-file implementation backs production use; the trait lets
/// tests substitute an in-memory store.
pub trait Registry {
    fn append(&self, record: SpawnRecord) -> Result<(), RegistryError>;
    fn filter(&self, agent: Option<&str>, cloud: Option<&str>) -> Result<Vec<SpawnRecord>, RegistryError>;
    fn active_servers(&self) -> Result<Vec<SpawnRecord>, RegistryError>;
    /// Flips `connection.deleted` on every active record matching `server_id`.
    fn mark_deleted(&self, server_id: &str) -> Result<(), RegistryError>;
    /// Drops a record entirely regardless of `deleted` state: an explicit
    /// "remove the history entry only" action.
    fn remove(&self, server_id: &str) -> Result<(), RegistryError>;
}

pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Vec<SpawnRecord>, RegistryError> {
        let raw = match LocalFile.read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RegistryError::Read(err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<SpawnRecord> = serde_json::from_str(&raw)?;
        for record in &records {
            record.validate().map_err(|reason| RegistryError::Tampered {
                path: self.path.clone(),
                reason: reason.to_string(),
            })?;
        }
        Ok(records)
    }

    fn save(&self, records: &[SpawnRecord]) -> Result<(), RegistryError> {
        let body = serde_json::to_string_pretty(records)?;
        atomic_write(&self.path, body)?;
        Ok(())
    }
}

impl Registry for FileRegistry {
    fn append(&self, record: SpawnRecord) -> Result<(), RegistryError> {
        record.validate()?;
        let mut records = self.load()?;
        records.push(record);
        self.save(&records)
    }

    fn filter(&self, agent: Option<&str>, cloud: Option<&str>) -> Result<Vec<SpawnRecord>, RegistryError> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(agent) = agent {
            let resolved = resolve_key(agent, &records, |r| &r.agent).unwrap_or_else(|| agent.to_string());
            records.retain(|r| r.agent == resolved);
        }
        if let Some(cloud) = cloud {
            let resolved = resolve_key(cloud, &records, |r| &r.cloud).unwrap_or_else(|| cloud.to_string());
            records.retain(|r| r.cloud == resolved);
        }
        Ok(records)
    }

    fn active_servers(&self) -> Result<Vec<SpawnRecord>, RegistryError> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.retain(SpawnRecord::is_active);
        Ok(records)
    }

    fn mark_deleted(&self, server_id: &str) -> Result<(), RegistryError> {
        let mut records = self.load()?;
        let mut found = false;
        for record in records.iter_mut() {
            if let Some(connection) = record.connection.as_mut() {
                if connection.server_id == server_id && !connection.deleted {
                    connection.deleted = true;
                    found = true;
                }
            }
        }
        if !found {
            return Err(RegistryError::NotFound);
        }
        self.save(&records)
    }

    fn remove(&self, server_id: &str) -> Result<(), RegistryError> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.connection.as_ref().map(|c| c.server_id.as_str()) != Some(server_id));
        if records.len() == before {
            return Err(RegistryError::NotFound);
        }
        self.save(&records)
    }
}

/// Applies the manifest's fuzzy-match rule to the distinct values already
/// present in `records`, so `spawn list --agent clod` still matches
/// `claude` records without a manifest fetch.
fn resolve_key<F>(input: &str, records: &[SpawnRecord], key_of: F) -> Option<String>
where
    F: Fn(&SpawnRecord) -> &String,
{
    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();
    for record in records {
        let key = key_of(record);
        if seen.insert(key.as_str()) {
            candidates.push(Candidate { key, display_name: key, kind: Kind::Agent });
        }
    }
    resolve(input, &candidates).map(|s| s.key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::Connection;
    use chrono::Utc;

    fn record(agent: &str, cloud: &str, server_id: &str) -> SpawnRecord {
        SpawnRecord {
            agent: agent.to_string(),
            cloud: cloud.to_string(),
            timestamp: Utc::now(),
            name: None,
            prompt: None,
            connection: Some(Connection {
                ip: "203.0.113.10".to_string(),
                user: "root".to_string(),
                server_id: server_id.to_string(),
                server_name: format!("spawn-{server_id}"),
                cloud: cloud.to_string(),
                launch_cmd: agent.to_string(),
                deleted: false,
                metadata: None,
            }),
        }
    }

    #[test]
    fn append_then_filter_by_exact_agent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("history.json"));
        registry.append(record("claude", "hetzner", "1")).unwrap();
        registry.append(record("codex", "hetzner", "2")).unwrap();

        let claude_only = registry.filter(Some("claude"), None).unwrap();
        assert_eq!(claude_only.len(), 1);
        assert_eq!(claude_only[0].agent, "claude");
    }

    #[test]
    fn append_rejects_invalid_record() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("history.json"));
        let mut bad = record("claude", "hetzner", "1");
        bad.connection.as_mut().unwrap().launch_cmd = "claude; rm -rf /".to_string();
        assert!(registry.append(bad).is_err());
    }

    #[test]
    fn mark_deleted_excludes_from_active_servers() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("history.json"));
        registry.append(record("claude", "hetzner", "1")).unwrap();
        registry.mark_deleted("1").unwrap();
        assert!(registry.active_servers().unwrap().is_empty());
    }

    #[test]
    fn tampered_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"[{"agent":"claude","cloud":"hetzner","timestamp":"2024-01-01T00:00:00Z","connection":{"ip":"not an ip","user":"root","server_id":"1","server_name":"s","cloud":"hetzner","launch_cmd":"claude"}}]"#).unwrap();
        let registry = FileRegistry::new(path);
        assert!(matches!(registry.load(), Err(RegistryError::Tampered { .. })));
    }
}
