//! Userdata generator.
use crate::manifest::CloudInitTier;

const MARKER_FILE: &str = "/tmp/spawn-cloud-init-done";

/// The bash script a provider hands to the instance as userdata. Tiers
/// are additive: `full` installs everything `minimal` does, `heavy`
/// everything `full` does.
pub struct CloudInitScript(String);

impl CloudInitScript {
    pub fn for_tier(tier: CloudInitTier) -> Self {
        let mut lines = vec!["#!/bin/bash".to_string(), "set -euo pipefail".to_string()];
        lines.push("apt-get update -y".to_string());
        lines.push("apt-get install -y curl unzip git".to_string());

        if matches!(tier, CloudInitTier::Full | CloudInitTier::Heavy) {
            lines.push("apt-get install -y python3 python3-pip build-essential".to_string());
        }
        if matches!(tier, CloudInitTier::Heavy) {
            lines.push(
                "curl -fsSL https://deb.nodesource.com/setup_lts.x | bash - && apt-get install -y nodejs"
                    .to_string(),
            );
            lines.push("curl -fsSL https://bun.sh/install | bash".to_string());
        }
        lines.push(format!("touch {MARKER_FILE}"));

        Self(lines.join("\n") + "\n")
    }

    pub fn script(&self) -> &str {
        &self.0
    }

    /// The command `wait_ready` polls for over SSH.
    pub fn ready_probe_command() -> String {
        format!("test -f {MARKER_FILE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_tier_skips_language_runtimes() {
        let script = CloudInitScript::for_tier(CloudInitTier::Minimal);
        assert!(script.script().contains("curl unzip git"));
        assert!(!script.script().contains("nodejs"));
    }

    #[test]
    fn heavy_tier_includes_node_and_bun() {
        let script = CloudInitScript::for_tier(CloudInitTier::Heavy);
        assert!(script.script().contains("nodejs"));
        assert!(script.script().contains("bun.sh"));
    }

    #[test]
    fn every_tier_touches_marker_file() {
        for tier in [CloudInitTier::Minimal, CloudInitTier::Full, CloudInitTier::Heavy] {
            assert!(CloudInitScript::for_tier(tier).script().contains("touch /tmp/spawn-cloud-init-done"));
        }
    }
}
