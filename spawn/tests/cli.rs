//! End-to-end exercise of the `spawn` binary (`assert_cmd` + `predicates`)
//! pointed at a mocked manifest endpoint via `SPAWN_MANIFEST_URL` so no
//! real network access is required.
use assert_cmd::Command;
use httpmock::MockServer;
use predicates::prelude::predicate;

fn sample_manifest_json() -> String {
    serde_json::json!({
        "agents": {
            "claude": {
                "display_name": "Claude Code",
                "description": "Anthropic's coding agent",
                "homepage": null,
                "install_hint": null,
                "launch_command": "claude",
                "environment_template": null,
                "featured_clouds": ["hetzner"],
                "cloud_init_tier": "full"
            }
        },
        "clouds": {
            "hetzner": {
                "display_name": "Hetzner",
                "description": "European VPS provider",
                "type": "vm",
                "homepage": "https://hetzner.com",
                "auth": "HCLOUD_TOKEN"
            }
        },
        "matrix": {
            "hetzner/claude": "implemented"
        }
    })
    .to_string()
}

struct Harness {
    _server: MockServer,
    home: tempfile::TempDir,
    config: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/manifest.json");
            then.status(200).body(sample_manifest_json());
        });
        let home = tempfile::tempdir().unwrap();
        let config = tempfile::tempdir().unwrap();
        Self { _server: server, home, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("spawn").unwrap();
        cmd.env("SPAWN_MANIFEST_URL", self._server.url("/manifest.json"))
            .env("SPAWN_HOME", self.home.path())
            .env("SPAWN_CONFIG_DIR", self.config.path())
            .env_remove("SPAWN_DEBUG");
        cmd
    }
}

#[test]
fn version_prints_the_crate_version() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_prints_the_usage_text() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("spawn"));
}

#[test]
fn agents_lists_the_fetched_manifest_contents() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("agents")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude").and(predicate::str::contains("Claude Code")));
}

#[test]
fn clouds_lists_the_fetched_manifest_contents() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("clouds")
        .assert()
        .success()
        .stdout(predicate::str::contains("hetzner").and(predicate::str::contains("Hetzner")));
}

#[test]
fn matrix_lists_implementation_status() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("matrix")
        .assert()
        .success()
        .stdout(predicate::str::contains("hetzner/claude"));
}

#[test]
fn list_on_an_empty_history_prints_nothing_and_succeeds() {
    let harness = Harness::new();
    harness.cmd().arg("list").assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn swapped_agent_and_cloud_arguments_are_detected_and_corrected() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("hetzner")
        .arg("claude")
        .arg("--dry-run")
        .assert()
        .success()
        .stderr(predicate::str::contains("swapped"));
}

#[test]
fn an_unknown_agent_name_fails_the_launch() {
    let harness = Harness::new();
    harness
        .cmd()
        .arg("totally-unknown-agent")
        .arg("hetzner")
        .arg("--dry-run")
        .assert()
        .failure();
}
