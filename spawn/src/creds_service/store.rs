//! Batch persistence and per-client/per-batch rate limiting: submissions
//! are rate-limited per client address and per batch id.
use super::model::Batch;
use crate::util::{atomic_write, AtomicWriteError};
use fs::file::reader::FileReader;
use fs::LocalFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read batch store: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse batch store: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
    #[error("batch `{0}` not found")]
    NotFound(String),
}

/// Sliding one-minute window: a count per key, reset once the window
/// elapses.
struct RateWindow {
    window: Duration,
    limit: u32,
    hits: HashMap<String, (u32, Instant)>,
}

impl RateWindow {
    fn new(limit: u32, window: Duration) -> Self {
        Self { window, limit, hits: HashMap::new() }
    }

    fn check(&mut self, key: &str) -> bool {
        let now = Instant::now();
        let entry = self.hits.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) > self.window {
            *entry = (0, now);
        }
        if entry.0 >= self.limit {
            return false;
        }
        entry.0 += 1;
        true
    }
}

pub struct BatchStore {
    path: PathBuf,
    batches: Mutex<HashMap<String, Batch>>,
    per_client: Mutex<RateWindow>,
    per_batch: Mutex<RateWindow>,
}

impl BatchStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let batches = match LocalFile.read(path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(StoreError::Read(err)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            batches: Mutex::new(batches),
            per_client: Mutex::new(RateWindow::new(10, Duration::from_secs(60))),
            per_batch: Mutex::new(RateWindow::new(5, Duration::from_secs(60))),
        })
    }

    fn persist(&self, batches: &HashMap<String, Batch>) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(batches)?;
        atomic_write(&self.path, body)?;
        Ok(())
    }

    /// Saved only after the admin email has been accepted.
    pub fn insert(&self, batch: Batch) -> Result<(), StoreError> {
        let mut batches = self.batches.lock().expect("batch store mutex poisoned");
        batches.insert(batch.batch_id.clone(), batch);
        self.persist(&batches)
    }

    pub fn get(&self, batch_id: &str) -> Option<Batch> {
        self.batches.lock().expect("batch store mutex poisoned").get(batch_id).cloned()
    }

    pub fn update(&self, batch: Batch) -> Result<(), StoreError> {
        let mut batches = self.batches.lock().expect("batch store mutex poisoned");
        if !batches.contains_key(&batch.batch_id) {
            return Err(StoreError::NotFound(batch.batch_id));
        }
        batches.insert(batch.batch_id.clone(), batch);
        self.persist(&batches)
    }

    pub fn allow_client(&self, client_addr: &str) -> bool {
        self.per_client.lock().expect("rate window mutex poisoned").check(client_addr)
    }

    pub fn allow_batch(&self, batch_id: &str) -> bool {
        self.per_batch.lock().expect("rate window mutex poisoned").check(batch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creds_service::model::{ProviderEntry, ProviderStatus};

    fn provider() -> ProviderEntry {
        ProviderEntry {
            key: "hetzner".to_string(),
            display_name: "Hetzner Cloud".to_string(),
            env_vars: vec!["HCLOUD_TOKEN".to_string()],
            help_url: "https://console.hetzner.cloud".to_string(),
            status: ProviderStatus::Pending,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::load(&dir.path().join("batches.json")).unwrap();
        let batch = Batch::new(vec![provider()]);
        let batch_id = batch.batch_id.clone();
        store.insert(batch).unwrap();
        assert!(store.get(&batch_id).is_some());
    }

    #[test]
    fn update_of_unknown_batch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::load(&dir.path().join("batches.json")).unwrap();
        let batch = Batch::new(vec![provider()]);
        assert!(matches!(store.update(batch), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn per_batch_rate_limit_trips_after_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::load(&dir.path().join("batches.json")).unwrap();
        for _ in 0..5 {
            assert!(store.allow_batch("batch-1"));
        }
        assert!(!store.allow_batch("batch-1"));
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.get("anything").is_none());
    }
}
