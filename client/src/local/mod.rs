//! Providers that keep everything in-process.
//!
//! [`MemoryStore`] stands in for the remote document store, optionally
//! sharing messages with other sessions over a broadcast bus, and
//! [`LocalIdentity`] issues identities locally. Both honour the same
//! contracts as a remote backend: sent messages come back through the
//! room's live query.

mod identity;
mod store;

pub use identity::LocalIdentity;
pub use store::{BroadcastBus, MemoryStore};
