//! Seams to the external collaborators: the document store holding
//! messages and the identity provider issuing user identities.

use async_trait::async_trait;
use parley_protocol::{Message, MessageDraft, RoomId, User};
use tokio::sync::{mpsc, watch};

use crate::error::{IdentityError, StoreError};

/// Pushed by a store to a live query
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The complete current result set for the query, ordered by timestamp
    Snapshot(Vec<Message>),
    /// The live query broke; no further events follow on this sink
    Error(StoreError),
}

pub type EventSink = mpsc::UnboundedSender<StoreEvent>;

/// Cancellation handle for a live query.
///
/// Cancelling is idempotent and also happens on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Durable, append-only message store with live queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Durably record a message. The store assigns its id and timestamp.
    async fn append(&self, draft: MessageDraft) -> Result<Message, StoreError>;

    /// Open a live query for one room's messages, ordered by timestamp
    /// ascending. Every change delivers the full result set to `sink`.
    async fn subscribe(&self, room: &RoomId, sink: EventSink) -> Result<Subscription, StoreError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, display_name: &str) -> Result<User, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Current identity, updated on every sign-in or sign-out, including
    /// a session resumed at startup. Drop the receiver to stop listening.
    fn identity_changes(&self) -> watch::Receiver<Option<User>>;
}
