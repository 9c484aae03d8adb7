//! Command-line argument shape. Argument parsing and help text are kept
//! thin — the dispatcher still needs a typed surface, so `clap` does the
//! actual parsing here.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spawn", author, about, long_about = None)]
pub struct Cli {
    /// An agent key, or one of the fixed subcommands (`list`, `delete`,
    /// `last`, `matrix`, `agents`, `clouds`, `update`, `version`, `help`,
    /// `pick`). Absent entirely launches the interactive picker.
    pub agent_or_command: Option<String>,

    /// A cloud key, present only for `spawn <agent> <cloud>`.
    pub cloud: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long = "prompt-file")]
    pub prompt_file: Option<PathBuf>,

    #[arg(long = "dry-run")]
    pub dry_run: bool,

    #[arg(long)]
    pub custom: bool,

    #[arg(long)]
    pub headless: bool,

    #[arg(long)]
    pub output: Option<String>,

    #[arg(long)]
    pub debug: bool,

    /// `spawn list`/`spawn delete` filter.
    #[arg(long)]
    pub agent: Option<String>,

    /// `spawn list`/`spawn delete` filter.
    #[arg(long)]
    pub cloud_filter: Option<String>,

    #[arg(long)]
    pub clear: bool,

    /// `spawn pick --prompt T`.
    #[arg(long = "default")]
    pub default: Option<String>,
}

impl Cli {
    /// Resolves `--prompt-file` over `--prompt`: `--prompt P | --prompt-file
    /// F` are mutually exclusive in intent.
    pub fn resolved_prompt(&self) -> std::io::Result<Option<String>> {
        if let Some(path) = &self.prompt_file {
            return Ok(Some(std::fs::read_to_string(path)?));
        }
        Ok(self.prompt.clone())
    }
}
