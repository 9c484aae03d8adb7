//! The `spawn-creds-service` entrypoint.
use spawn::config::BasePaths;
use spawn::creds_service::{router, CredsServiceState};
use spawn::instrumentation::try_init_tracing;
use spawn::manifest::ManifestService;
use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(feature = "smtp")]
fn build_sender(admin_email: &str) -> Arc<dyn spawn::creds_service::EmailSender> {
    let relay = env::var("SPAWN_SMTP_RELAY").expect("SPAWN_SMTP_RELAY is required with the smtp feature");
    let username = env::var("SPAWN_SMTP_USER").expect("SPAWN_SMTP_USER is required with the smtp feature");
    let password = env::var("SPAWN_SMTP_PASSWORD").expect("SPAWN_SMTP_PASSWORD is required with the smtp feature");
    let from = format!("spawn <{admin_email}>").parse().expect("SPAWN_ADMIN_EMAIL must parse as a mailbox");
    Arc::new(
        spawn::creds_service::email::SmtpSender::new(&relay, username, password, from)
            .expect("failed to build the SMTP transport"),
    )
}

#[cfg(not(feature = "smtp"))]
fn build_sender(_admin_email: &str) -> Arc<dyn spawn::creds_service::EmailSender> {
    warn!("built without the smtp feature; credential batch emails are only logged in-memory");
    Arc::new(spawn::creds_service::InMemorySender::new())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_init_tracing(env::var("SPAWN_DEBUG").as_deref() == Ok("1")) {
        eprintln!("could not initialize tracing: {err}");
    }

    let paths = BasePaths::default();
    let manifest_service = ManifestService::new(paths.manifest_cache_file());
    let (manifest, _) = match manifest_service.load() {
        Ok(result) => result,
        Err(err) => {
            error!(%err, "failed to load the manifest");
            return ExitCode::from(1);
        }
    };

    let Ok(sign_secret) = env::var("SPAWN_CREDS_SIGN_SECRET") else {
        error!("SPAWN_CREDS_SIGN_SECRET is required");
        return ExitCode::from(3);
    };
    let Ok(bearer_secret) = env::var("SPAWN_CREDS_BEARER_SECRET") else {
        error!("SPAWN_CREDS_BEARER_SECRET is required");
        return ExitCode::from(3);
    };
    let Ok(admin_email) = env::var("SPAWN_ADMIN_EMAIL") else {
        error!("SPAWN_ADMIN_EMAIL is required");
        return ExitCode::from(3);
    };
    let link_base_url = env::var("SPAWN_CREDS_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8788".to_string());

    let store = match spawn::creds_service::BatchStore::load(&paths.spawn_home.join("credential-batches.json")) {
        Ok(store) => store,
        Err(err) => {
            error!(%err, "failed to load the credential batch store");
            return ExitCode::from(1);
        }
    };

    let email = build_sender(&admin_email);
    let state = Arc::new(CredsServiceState {
        store,
        manifest,
        paths,
        sign_secret,
        bearer_secret,
        admin_email,
        link_base_url,
        email,
    });

    let addr: SocketAddr = env::var("SPAWN_CREDS_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8788".to_string())
        .parse()
        .expect("SPAWN_CREDS_ADDR must be a valid socket address");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %addr, "failed to bind credential service listener");
            return ExitCode::from(1);
        }
    };
    info!(%addr, "credential self-service listening");

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "credential self-service exited with an error");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
