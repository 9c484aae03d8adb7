//! Run slot bookkeeping for the `/trigger` endpoint.
use chrono::{DateTime, Utc};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RunSlot {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl RunSlot {
    fn is_alive(&self) -> bool {
        signal::kill(Pid::from_raw(self.pid as i32), None).is_ok()
    }

    fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }
}

/// The mutex-guarded slot set shared between `/health`, `/trigger`, and the
/// periodic background sweep.
#[derive(Clone, Default)]
pub struct SlotStore(Arc<Mutex<Vec<RunSlot>>>);

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32, reason: Option<String>) {
        let mut slots = self.0.lock().expect("slot mutex poisoned");
        slots.push(RunSlot { pid, started_at: Utc::now(), reason });
    }

    pub fn snapshot(&self) -> Vec<RunSlot> {
        self.0.lock().expect("slot mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().expect("slot mutex poisoned").len()
    }

    pub fn oldest_age_secs(&self) -> Option<i64> {
        self.0
            .lock()
            .expect("slot mutex poisoned")
            .iter()
            .map(|s| s.age().num_seconds())
            .max()
    }

    /// Drops slots whose pid is no longer alive.
    pub fn reap_dead(&self) {
        let mut slots = self.0.lock().expect("slot mutex poisoned");
        let before = slots.len();
        slots.retain(RunSlot::is_alive);
        if slots.len() != before {
            info!(reaped = before - slots.len(), "reaped dead run slots");
        }
    }

    /// Force-kills (and drops) slots older than `run_timeout`, targeting
    /// both the slot's process group and its leader pid so a workflow
    /// script's children are terminated along with it.
    pub fn reap_timed_out(&self, run_timeout: Duration) {
        let mut slots = self.0.lock().expect("slot mutex poisoned");
        let limit = chrono::Duration::from_std(run_timeout).unwrap_or_else(|_| chrono::Duration::days(365));
        let (expired, mut alive): (Vec<_>, Vec<_>) = slots.drain(..).partition(|s| s.age() > limit);
        for slot in &expired {
            warn!(pid = slot.pid, "run slot exceeded timeout, sending SIGKILL to its process tree");
            let _ = signal::kill(Pid::from_raw(-(slot.pid as i32)), Signal::SIGKILL);
            let _ = signal::kill(Pid::from_raw(slot.pid as i32), Signal::SIGKILL);
        }
        alive.retain(RunSlot::is_alive);
        *slots = alive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_pid_is_reaped() {
        let store = SlotStore::new();
        // pid 1 is conventionally init and outlives this test; a huge pid is
        // very unlikely to be a live process in the test sandbox.
        store.register(999_999, None);
        store.reap_dead();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn alive_pid_is_kept() {
        let store = SlotStore::new();
        store.register(std::process::id(), Some("self".to_string()));
        store.reap_dead();
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn oldest_age_is_none_when_empty() {
        let store = SlotStore::new();
        assert_eq!(store.oldest_age_secs(), None);
    }
}
