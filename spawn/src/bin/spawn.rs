//! The `spawn` CLI entrypoint.
use clap::Parser;
use spawn::cli::{Cli, Dispatcher};
use spawn::config::BasePaths;
use spawn::instrumentation::try_init_tracing;
use spawn::manifest::ManifestService;
use std::process::ExitCode;
use tracing::{error, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = try_init_tracing(cli.debug) {
        eprintln!("could not initialize tracing: {err}");
    }

    let paths = BasePaths::default();
    let manifest_service = ManifestService::new(paths.manifest_cache_file());
    let (manifest, used_stale_cache) = match manifest_service.load() {
        Ok(result) => result,
        Err(err) => {
            error!(%err, "failed to load the manifest");
            return ExitCode::from(1);
        }
    };
    if used_stale_cache {
        warn!("using a stale cached manifest; network fetch failed");
    }

    let dispatcher = Dispatcher::new(paths, manifest);
    match dispatcher.dispatch(&cli) {
        Ok(code) => exit_code(code),
        Err(err) => {
            error!(%err, "spawn exited with an error");
            exit_code(err.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
