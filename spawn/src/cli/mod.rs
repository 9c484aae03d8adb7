//! Entrypoint dispatcher: resolves user intent and drives the rest of the
//! crate. Argument parsing and TUI chrome are kept thin — both are
//! treated as external collaborators.
pub mod args;
pub mod dispatch;
pub mod pick;

pub use args::Cli;
pub use dispatch::Dispatcher;
