//! Resolved directories and environment-derived run configuration.
//!
//! A small struct resolved once at startup, defaulted and overridable
//! purely by environment variable (spawn has no config-file search path
//! beyond the manifest cache and the registry itself).
use std::env;
use std::path::PathBuf;

/// The three directories every invocation of `spawn` operates against.
#[derive(Debug, Clone)]
pub struct BasePaths {
    /// `<SPAWN_HOME>`, default `~/.spawn`. Holds `history.json`,
    /// `last-connection.json`, and the cached manifest.
    pub spawn_home: PathBuf,
    /// `~/.config/spawn`. Holds per-provider credential bundles.
    pub config_dir: PathBuf,
}

impl Default for BasePaths {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let spawn_home = env::var_os("SPAWN_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".spawn"));
        let config_dir = env::var_os("SPAWN_CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| home.join(".config"))
                .join("spawn")
        });
        Self {
            spawn_home,
            config_dir,
        }
    }
}

impl BasePaths {
    pub fn history_file(&self) -> PathBuf {
        self.spawn_home.join("history.json")
    }

    pub fn last_connection_file(&self) -> PathBuf {
        self.spawn_home.join("last-connection.json")
    }

    pub fn manifest_cache_file(&self) -> PathBuf {
        self.spawn_home.join("manifest-cache.json")
    }

    pub fn credential_file(&self, cloud_key: &str) -> PathBuf {
        self.config_dir.join(format!("{cloud_key}.json"))
    }
}

/// Flags read directly from the environment's recognized variable table.
/// Booleans are considered set when the variable equals `"1"`.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub non_interactive: bool,
    pub headless: bool,
    pub debug: bool,
    pub custom: bool,
    pub no_update_check: bool,
    pub no_unicode: bool,
    pub force_unicode: bool,
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| v == "1").unwrap_or(false)
}

impl RunFlags {
    pub fn from_env() -> Self {
        Self {
            non_interactive: env_flag("SPAWN_NON_INTERACTIVE"),
            headless: env_flag("SPAWN_HEADLESS"),
            debug: env_flag("SPAWN_DEBUG"),
            custom: env_flag("SPAWN_CUSTOM"),
            no_update_check: env_flag("SPAWN_NO_UPDATE_CHECK"),
            no_unicode: env_flag("SPAWN_NO_UNICODE"),
            force_unicode: env_flag("SPAWN_UNICODE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_paths_join_expected_filenames() {
        let paths = BasePaths {
            spawn_home: PathBuf::from("/home/u/.spawn"),
            config_dir: PathBuf::from("/home/u/.config/spawn"),
        };
        assert_eq!(
            paths.history_file(),
            PathBuf::from("/home/u/.spawn/history.json")
        );
        assert_eq!(
            paths.credential_file("hetzner"),
            PathBuf::from("/home/u/.config/spawn/hetzner.json")
        );
    }
}
