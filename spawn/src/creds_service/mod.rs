//! Credential self-service subsystem: a small web service that batches up
//! missing provider credentials, emails an admin a signed single-use
//! link, and collects the filled-in values back.
pub mod email;
pub mod model;
pub mod server;
pub mod sign;
pub mod store;

pub use email::{EmailError, EmailSender, InMemorySender};
pub use model::{Batch, ProviderEntry, ProviderStatus};
pub use server::{router, CredsServiceState};
pub use store::{BatchStore, StoreError};
