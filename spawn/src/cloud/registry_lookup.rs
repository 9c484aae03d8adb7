//! Provider registration seam: the only file that names a concrete
//! provider type. Adding a provider means adding one arm here, never
//! touching the orchestrator.
use crate::cloud::daytona::DaytonaDriver;
use crate::cloud::hetzner::HetznerDriver;
use crate::cloud::sprite::SpriteDriver;
use crate::cloud::CloudDriver;
use crate::config::BasePaths;

/// Constructs the capability struct for `cloud_key`, or `None` if the
/// manifest declares the cloud but this build carries no concrete driver
/// for it (surfaces as `matrix: missing`).
pub fn build_driver(cloud_key: &str, paths: &BasePaths) -> Option<Box<dyn CloudDriver>> {
    match cloud_key {
        "hetzner" => Some(Box::new(HetznerDriver::new(paths.credential_file("hetzner")))),
        "sprite" => Some(Box::new(SpriteDriver::new(paths.credential_file("sprite")))),
        "daytona" => Some(Box::new(DaytonaDriver::new(paths.credential_file("daytona")))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_clouds_resolve_to_a_driver() {
        let paths = BasePaths {
            spawn_home: "/tmp/spawn-test".into(),
            config_dir: "/tmp/spawn-test/config".into(),
        };
        assert!(build_driver("hetzner", &paths).is_some());
        assert!(build_driver("sprite", &paths).is_some());
        assert!(build_driver("daytona", &paths).is_some());
        assert!(build_driver("fictitious", &paths).is_none());
    }
}
