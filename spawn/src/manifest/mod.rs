//! Read-only catalog of agents, clouds, and the implementation matrix.
pub mod loader;
pub mod resolve;
pub mod types;

pub use loader::{load, ManifestError};
pub use resolve::{Candidate, Kind, Suggestion};
pub use types::{AgentDef, CloudDef, CloudInitTier, Manifest, MatrixStatus};

use std::path::PathBuf;

const DEFAULT_MANIFEST_URL: &str = "https://spawn.dev/manifest.json";

/// Thin facade the rest of the crate depends on instead of the `loader`
/// free functions directly, so tests can point it at a mock server and a
/// temp cache path.
pub struct ManifestService {
    client: reqwest::blocking::Client,
    url: String,
    cache_path: PathBuf,
}

impl ManifestService {
    pub fn new(cache_path: PathBuf) -> Self {
        let url = std::env::var("SPAWN_MANIFEST_URL").unwrap_or_else(|_| DEFAULT_MANIFEST_URL.to_string());
        Self {
            client: reqwest::blocking::Client::new(),
            url,
            cache_path,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Loads the manifest, returning it alongside whether a stale cache
    /// copy was used (the caller should warn in that case).
    pub fn load(&self) -> Result<(Manifest, bool), ManifestError> {
        loader::load(&self.client, &self.url, &self.cache_path)
    }

    pub fn is_stale(&self) -> bool {
        loader::is_stale(&self.cache_path)
    }
}

impl Manifest {
    fn candidates_of(&self, kind: Kind) -> Vec<Candidate<'_>> {
        match kind {
            Kind::Agent => self
                .agents
                .iter()
                .map(|(key, def)| Candidate {
                    key,
                    display_name: &def.display_name,
                    kind: Kind::Agent,
                })
                .collect(),
            Kind::Cloud => self
                .clouds
                .iter()
                .map(|(key, def)| Candidate {
                    key,
                    display_name: &def.display_name,
                    kind: Kind::Cloud,
                })
                .collect(),
        }
    }

    /// Resolves `input` as the given kind; on failure, also checks the
    /// opposite kind so callers can emit the "you swapped the arguments"
    /// hint.
    pub fn resolve(&self, input: &str, kind: Kind) -> Option<Suggestion> {
        let own = self.candidates_of(kind);
        if let Some(found) = resolve::resolve(input, &own) {
            return Some(found);
        }
        let opposite = match kind {
            Kind::Agent => Kind::Cloud,
            Kind::Cloud => Kind::Agent,
        };
        resolve::resolve(input, &self.candidates_of(opposite))
    }
}
