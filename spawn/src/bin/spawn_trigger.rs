//! The `spawn-trigger` HTTP runner entrypoint.
use spawn::instrumentation::try_init_tracing;
use spawn::trigger::{reaper, router, TriggerState};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

fn env_duration(name: &str, default_secs: u64) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_init_tracing(env::var("SPAWN_DEBUG").as_deref() == Ok("1")) {
        eprintln!("could not initialize tracing: {err}");
    }

    let Ok(script_path) = env::var("SPAWN_TRIGGER_SCRIPT") else {
        error!("SPAWN_TRIGGER_SCRIPT is required: path to the workflow script to supervise");
        return ExitCode::from(3);
    };
    let Ok(secret) = env::var("SPAWN_TRIGGER_SECRET") else {
        error!("SPAWN_TRIGGER_SECRET is required: bearer token for /trigger");
        return ExitCode::from(3);
    };

    let state = Arc::new(TriggerState {
        slots: spawn::trigger::SlotStore::new(),
        secret,
        max_concurrent: env_usize("SPAWN_MAX_CONCURRENT", 1),
        run_timeout: env_duration("SPAWN_RUN_TIMEOUT_SEC", 3600),
        idle_timeout: env_duration("SPAWN_IDLE_TIMEOUT_SEC", 600),
        hard_ceiling: env_duration("SPAWN_HARD_CEILING_SEC", 7200),
        script_path: PathBuf::from(script_path),
        working_dir: env::var("SPAWN_TRIGGER_WORKDIR").ok().map(PathBuf::from),
        shutting_down: AtomicBool::new(false),
    });

    let addr: std::net::SocketAddr = env::var("SPAWN_TRIGGER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse()
        .expect("SPAWN_TRIGGER_ADDR must be a valid socket address");

    let sweep_state = Arc::clone(&state);
    tokio::spawn(reaper::run(sweep_state));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %addr, "failed to bind trigger runner listener");
            return ExitCode::from(1);
        }
    };
    info!(%addr, "trigger runner listening");

    let shutdown_state = Arc::clone(&state);
    let server = axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
        });

    let result = server.await;
    let clean = reaper::drain(shutdown_state).await;
    if let Err(err) = result {
        error!(%err, "trigger runner exited with an error");
        return ExitCode::from(1);
    }
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

