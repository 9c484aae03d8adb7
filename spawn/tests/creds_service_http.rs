//! Exercises the credential self-service HTTP surface over a real bound
//! socket with an in-memory email sender, so the signed-link flow can be
//! driven end-to-end without a real SMTP relay.
use spawn::config::BasePaths;
use spawn::creds_service::{router, CredsServiceState, EmailSender, InMemorySender};
use spawn::manifest::{CloudDef, Manifest};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

fn manifest_with_hetzner() -> Manifest {
    let mut clouds = HashMap::new();
    clouds.insert(
        "hetzner".to_string(),
        CloudDef {
            display_name: "Hetzner Cloud".into(),
            description: "European VPS provider".into(),
            cloud_type: "vm".into(),
            homepage: "https://console.hetzner.cloud".into(),
            auth: "HCLOUD_TOKEN".into(),
        },
    );
    Manifest { agents: HashMap::new(), clouds, matrix: HashMap::new() }
}

struct Harness {
    addr: SocketAddr,
    sender: Arc<InMemorySender>,
    _home: tempfile::TempDir,
    _config: tempfile::TempDir,
}

async fn spawn_creds_server() -> Harness {
    let home = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let sender = Arc::new(InMemorySender::new());
    let email: Arc<dyn EmailSender> = sender.clone();
    let state = Arc::new(CredsServiceState {
        store: spawn::creds_service::BatchStore::load(&home.path().join("batches.json")).unwrap(),
        manifest: manifest_with_hetzner(),
        paths: BasePaths { spawn_home: home.path().to_path_buf(), config_dir: config.path().to_path_buf() },
        sign_secret: "sign-secret".to_string(),
        bearer_secret: "bearer-secret".to_string(),
        admin_email: "admin@example.com".to_string(),
        link_base_url: "http://127.0.0.1:8788".to_string(),
        email,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });
    Harness { addr, sender, _home: home, _config: config }
}

#[tokio::test]
async fn requesting_a_batch_emails_a_signed_link() {
    let harness = spawn_creds_server().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/request-batch", harness.addr))
        .json(&serde_json::json!({ "providers": ["hetzner"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(!body["batch_id"].as_str().unwrap().is_empty());

    let sent = harness.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "admin@example.com");
    assert!(sent[0].2.contains("Hetzner Cloud"));
}

fn extract_link(body: &str) -> (String, i64, String) {
    let start = body.find("http://").expect("link present in email body");
    let end = body[start..].find('\n').map(|i| start + i).unwrap_or(body.len());
    let link = &body[start..end];
    let url = url::Url::parse(link).unwrap();
    let mut exp = 0i64;
    let mut sig = String::new();
    for (k, v) in url.query_pairs() {
        if k == "exp" {
            exp = v.parse().unwrap();
        }
        if k == "sig" {
            sig = v.to_string();
        }
    }
    let batch_id = url.path_segments().unwrap().last().unwrap().to_string();
    (batch_id, exp, sig)
}

#[tokio::test]
async fn submitting_valid_credentials_fulfills_the_batch_and_writes_the_file() {
    let harness = spawn_creds_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/request-batch", harness.addr))
        .json(&serde_json::json!({ "providers": ["hetzner"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let sent = harness.sender.sent();
    let (batch_id, exp, sig) = extract_link(&sent[0].2);

    let form = client
        .get(format!("http://{}/batch/{batch_id}?exp={exp}&sig={sig}", harness.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(form.status(), reqwest::StatusCode::OK);
    assert_eq!(form.headers().get("x-content-type-options").unwrap(), "nosniff");

    let submit = client
        .post(format!("http://{}/batch/{batch_id}", harness.addr))
        .json(&serde_json::json!({
            "exp": exp,
            "sig": sig,
            "values": { "hetzner": { "HCLOUD_TOKEN": "abc.def-123" } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status(), reqwest::StatusCode::OK);
    let fulfilled: Vec<String> = submit.json().await.unwrap();
    assert_eq!(fulfilled, vec!["hetzner".to_string()]);
    assert!(harness._config.path().join("hetzner.json").exists());
}

#[tokio::test]
async fn submitting_with_a_shell_metacharacter_is_rejected() {
    let harness = spawn_creds_server().await;
    let client = reqwest::Client::new();
    client
        .post(format!("http://{}/request-batch", harness.addr))
        .json(&serde_json::json!({ "providers": ["hetzner"] }))
        .send()
        .await
        .unwrap();
    let sent = harness.sender.sent();
    let (batch_id, exp, sig) = extract_link(&sent[0].2);

    let submit = client
        .post(format!("http://{}/batch/{batch_id}", harness.addr))
        .json(&serde_json::json!({
            "exp": exp,
            "sig": sig,
            "values": { "hetzner": { "HCLOUD_TOKEN": "abc; rm -rf /" } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn a_tampered_signature_is_rejected_with_403() {
    let harness = spawn_creds_server().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/batch/not-a-real-batch?exp=9999999999&sig=deadbeef", harness.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_key_requires_the_bearer_token() {
    let harness = spawn_creds_server().await;
    let client = reqwest::Client::new();
    let unauthorized =
        client.delete(format!("http://{}/key/hetzner", harness.addr)).send().await.unwrap();
    assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

    let authorized = client
        .delete(format!("http://{}/key/hetzner", harness.addr))
        .header("Authorization", "Bearer bearer-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(authorized.status(), reqwest::StatusCode::NO_CONTENT);
}
