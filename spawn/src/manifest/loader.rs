//! Remote fetch with local cache fallback.
//!
//! A scaled-down reqwest helper for spawn's single blocking GET,
//! classifying failures into the Download error taxonomy instead of
//! building a general-purpose HTTP client.
use super::types::{Manifest, ManifestValidationError};
use crate::util::{atomic_write, AtomicWriteError};
use chrono::{DateTime, Utc};
use fs::file::reader::FileReader;
use fs::LocalFile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const FRESH_TTL_HOURS: i64 = 24;
const STALE_USABLE_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found upstream (404)")]
    NotFound,
    #[error("manifest fetch returned HTTP {0}")]
    Http(u16),
    #[error("network error fetching manifest: {0}")]
    Network(#[source] reqwest::Error),
    #[error("manifest cache is stale beyond the usable window and no network is available")]
    StaleBeyondUsable,
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ManifestValidationError),
    #[error("failed to write manifest cache: {0}")]
    CacheWrite(#[from] AtomicWriteError),
    #[error("no cached manifest available and network fetch failed")]
    NoCache,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedManifest {
    fetched_at: DateTime<Utc>,
    manifest: Manifest,
}

/// Fetches the manifest, falling back to a local cache on network failure.
/// On success, atomically refreshes the cache. Returns `(manifest, stale)`
/// where `stale` is true only when a cached copy older than the fresh TTL
/// was used.
#[instrument(skip(client), fields(url = %url))]
pub fn load(
    client: &reqwest::blocking::Client,
    url: &str,
    cache_path: &Path,
) -> Result<(Manifest, bool), ManifestError> {
    match fetch(client, url) {
        Ok(manifest) => {
            manifest.validate()?;
            write_cache(cache_path, &manifest)?;
            Ok((manifest, false))
        }
        Err(err) => {
            warn!(%err, "manifest fetch failed, falling back to cache");
            let cached = read_cache(cache_path)?;
            cached.manifest.validate()?;
            let age = Utc::now().signed_duration_since(cached.fetched_at);
            if age > chrono::Duration::days(STALE_USABLE_DAYS) {
                return Err(ManifestError::StaleBeyondUsable);
            }
            Ok((cached.manifest, is_stale_at(cached.fetched_at)))
        }
    }
}

/// Whether the cache at `cache_path` is older than the fresh TTL. Returns
/// `true` (conservatively) if no cache exists or it fails to parse.
pub fn is_stale(cache_path: &Path) -> bool {
    match read_cache(cache_path) {
        Ok(cached) => is_stale_at(cached.fetched_at),
        Err(_) => true,
    }
}

fn is_stale_at(fetched_at: DateTime<Utc>) -> bool {
    Utc::now().signed_duration_since(fetched_at) > chrono::Duration::hours(FRESH_TTL_HOURS)
}

fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<Manifest, ManifestError> {
    let response = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .map_err(ManifestError::Network)?;

    match response.status().as_u16() {
        200..=299 => {
            let manifest: Manifest = response.json().map_err(ManifestError::Network)?;
            debug!("fetched manifest from origin");
            Ok(manifest)
        }
        404 => Err(ManifestError::NotFound),
        other => Err(ManifestError::Http(other)),
    }
}

fn read_cache(cache_path: &Path) -> Result<CachedManifest, ManifestError> {
    let raw = LocalFile
        .read(cache_path)
        .map_err(|_| ManifestError::NoCache)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_cache(cache_path: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    let cached = CachedManifest {
        fetched_at: Utc::now(),
        manifest: manifest.clone(),
    };
    let body = serde_json::to_string_pretty(&cached)?;
    atomic_write(cache_path, body)?;
    Ok(())
}
