//! The spawn record store: data model, JSON-file persistence, and
//! reconnect classification.
pub mod reconnect;
pub mod store;
pub mod types;

pub use reconnect::{classify, reconnect, ReconnectKind};
pub use store::{FileRegistry, Registry, RegistryError};
pub use types::{Connection, RecordValidationError, SpawnRecord};
