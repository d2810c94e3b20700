//! Real-time chat client core.
//!
//! The pieces, leaves first:
//!
//! - [`RoomStreams`] - one live query per room, shared by every consumer
//!   through [`LiveCollection`] handles
//! - [`MessageSender`] / [`Composer`] - validate and store outgoing messages
//! - [`Session`] - the signed-in user and the selected room
//! - [`RoomFeed`] - follows the selected room's messages
//! - [`ChatClient`] - wires the above to a [`DocumentStore`] and an
//!   [`IdentityProvider`]
//!
//! Sent messages are never inserted locally: they appear once the store
//! echoes them back through the room's live query.

pub mod config;
pub mod error;
pub mod feed;
pub mod local;
pub mod observable;
pub mod persist;
pub mod provider;
pub mod sender;
pub mod session;
pub mod streams;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parley_protocol::{RoomCatalog, ValidationError};
use tokio::task::JoinHandle;

pub use parley_protocol::{ChatRoom, Message, MessageDraft, RoomId, User, UserId};

pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{CacheError, IdentityError, SendError, StoreError};
pub use feed::{RoomFeed, RoomView};
pub use observable::Observable;
pub use persist::{FileIdentityCache, IdentityCache, MemoryIdentityCache};
pub use provider::{DocumentStore, EventSink, IdentityProvider, StoreEvent, Subscription};
pub use sender::{Composer, MessageSender};
pub use session::Session;
pub use streams::{LiveCollection, Messages, RoomStreams, StreamStatus};

/// Chat client over a document store and an identity provider.
///
/// Dropping the client releases every room stream.
pub struct ChatClient {
    identity: Arc<dyn IdentityProvider>,
    streams: RoomStreams,
    sender: MessageSender,
    session: Session,
    mirror: JoinHandle<()>,
}

impl ChatClient {
    /// Must be called from within a Tokio runtime
    pub fn new(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, ValidationError> {
        let catalog = RoomCatalog::new(config.rooms.clone())?;
        let streams = RoomStreams::new(store.clone(), config.reconnect.clone());
        let session = Session::new(catalog, streams.clone());
        let mirror = session.mirror_identity(identity.identity_changes());

        Ok(Self {
            identity,
            streams,
            sender: MessageSender::new(store),
            session,
            mirror,
        })
    }

    /// Sign in under a display name. Leading and trailing whitespace is
    /// dropped; a blank name is rejected without contacting the provider.
    pub async fn login(&self, display_name: &str) -> Result<User, IdentityError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(IdentityError::EmptyName);
        }

        let user = self.identity.sign_in(display_name).await?;
        tracing::debug!(user = %user.id, username = %user.username, "Signed in");
        self.session.apply_identity(Some(user.clone()));
        Ok(user)
    }

    /// Sign out and release every room stream
    pub async fn logout(&self) -> Result<(), IdentityError> {
        self.identity.sign_out().await?;
        self.session.apply_identity(None);
        Ok(())
    }

    pub fn user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn rooms(&self) -> &[ChatRoom] {
        self.session.catalog().rooms()
    }

    pub fn current_room(&self) -> ChatRoom {
        self.session.current_room()
    }

    /// Make a catalog room current. Returns `None` for unknown ids.
    pub fn select_room(&self, id: &RoomId) -> Option<ChatRoom> {
        self.session.select_room(id)
    }

    pub fn messages(&self, room: &RoomId) -> LiveCollection {
        self.streams.stream_for(room)
    }

    /// Messages of whichever room is current
    pub fn current_feed(&self) -> RoomFeed {
        RoomFeed::new(&self.session, self.streams.clone())
    }

    /// Send to the current room as the signed-in user
    pub async fn send(&self, text: &str) -> Result<Message, SendError> {
        let user = self
            .session
            .current_user()
            .ok_or(ValidationError::MissingSender)?;
        let room = self.session.current_room();

        self.sender
            .send(text, &user.id, &user.username, &room.id)
            .await
    }

    pub fn composer(&self) -> Composer {
        Composer::new(self.sender.clone())
    }

    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn streams(&self) -> &RoomStreams {
        &self.streams
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.mirror.abort();
        self.streams.teardown_all();
    }
}
