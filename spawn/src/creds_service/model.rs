//! Batch request / signed link data model.
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Pending,
    Fulfilled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub key: String,
    pub display_name: String,
    pub env_vars: Vec<String>,
    pub help_url: String,
    pub status: ProviderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub providers: Vec<ProviderEntry>,
    pub emailed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Batch {
    /// Creates a batch with a 24-hour expiry and a random 128-bit id
    /// rendered as lowercase hex.
    pub fn new(providers: Vec<ProviderEntry>) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let batch_id = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self { batch_id, providers, emailed_at: None, expires_at: Utc::now() + Duration::hours(24) }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A provider transitions to `fulfilled` only once every one of its
    /// declared env vars has a non-empty value in `submitted`.
    pub fn try_fulfill(&mut self, provider_key: &str, submitted: &std::collections::HashMap<String, String>) -> bool {
        let Some(provider) = self.providers.iter_mut().find(|p| p.key == provider_key) else {
            return false;
        };
        let all_filled = provider
            .env_vars
            .iter()
            .all(|var| submitted.get(var).is_some_and(|v| !v.trim().is_empty()));
        if all_filled {
            provider.status = ProviderStatus::Fulfilled;
        }
        all_filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> Vec<ProviderEntry> {
        vec![ProviderEntry {
            key: "hetzner".to_string(),
            display_name: "Hetzner Cloud".to_string(),
            env_vars: vec!["HCLOUD_TOKEN".to_string()],
            help_url: "https://console.hetzner.cloud".to_string(),
            status: ProviderStatus::Pending,
        }]
    }

    #[test]
    fn new_batch_expires_in_24_hours() {
        let batch = Batch::new(providers());
        let expected = Utc::now() + Duration::hours(24);
        assert!((batch.expires_at - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn fulfillment_requires_every_env_var() {
        let mut batch = Batch::new(providers());
        let mut submitted = std::collections::HashMap::new();
        submitted.insert("HCLOUD_TOKEN".to_string(), "".to_string());
        assert!(!batch.try_fulfill("hetzner", &submitted));
        submitted.insert("HCLOUD_TOKEN".to_string(), "abc123".to_string());
        assert!(batch.try_fulfill("hetzner", &submitted));
        assert_eq!(batch.providers[0].status, ProviderStatus::Fulfilled);
    }
}
