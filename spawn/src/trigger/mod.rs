//! The trigger runner: a long-lived local HTTP listener that supervises a
//! single-cycle workflow script.
pub mod reaper;
pub mod server;
pub mod slot;
pub mod watchdog;

pub use server::{router, TriggerState};
pub use slot::{RunSlot, SlotStore};
