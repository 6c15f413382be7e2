//! `cmdhub-dispatch`: the command processor.
//!
//! Classifies inbound events, executes prefix and slash commands against
//! their modules, stores responses for deferred retrieval, and fans out
//! best-effort notifications through a bounded background pool.

pub mod notifier;
pub mod processor;
pub mod responses;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use notifier::{EventContext, Notifiers};
pub use processor::{CommandProcessor, ProcessorBuilder};
pub use responses::ResponseStore;
pub use tasks::TaskPool;
