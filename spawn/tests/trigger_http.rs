//! Exercises the trigger runner's HTTP surface over a real bound socket,
//! driving its axum service end-to-end rather than unit-testing handlers
//! in isolation.
use spawn::trigger::{router, SlotStore, TriggerState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(secret: &str, script_path: PathBuf) -> SocketAddr {
    let state = Arc::new(TriggerState {
        slots: SlotStore::new(),
        secret: secret.to_string(),
        max_concurrent: 1,
        run_timeout: Duration::from_secs(60),
        idle_timeout: Duration::from_secs(60),
        hard_ceiling: Duration::from_secs(60),
        script_path,
        working_dir: None,
        shutting_down: AtomicBool::new(false),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn health_reports_ok_with_no_runs() {
    let addr = spawn_server("s3cr3t", PathBuf::from("/bin/true")).await;
    let client = reqwest::Client::new();
    let body: serde_json::Value =
        client.get(format!("http://{addr}/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running"], 0);
}

#[tokio::test]
async fn trigger_without_bearer_is_unauthorized() {
    let addr = spawn_server("s3cr3t", PathBuf::from("/bin/true")).await;
    let client = reqwest::Client::new();
    let response = client.post(format!("http://{addr}/trigger")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trigger_with_valid_bearer_spawns_the_script() {
    let addr = spawn_server("s3cr3t", PathBuf::from("/bin/true")).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/trigger"))
        .header("Authorization", "Bearer s3cr3t")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

fn slow_script() -> (tempfile::TempDir, PathBuf) {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slow.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\nsleep 5\n").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    (dir, path)
}

#[tokio::test]
async fn a_second_trigger_over_capacity_is_rejected_with_429() {
    let (_dir, script) = slow_script();
    let addr = spawn_server("s3cr3t", script).await;
    let client = reqwest::Client::new();
    let first = client
        .post(format!("http://{addr}/trigger?reason=first"))
        .header("Authorization", "Bearer s3cr3t")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    let second = client
        .post(format!("http://{addr}/trigger?reason=second"))
        .header("Authorization", "Bearer s3cr3t")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
}
