use std::sync::Arc;

use parley_protocol::{Message, MessageDraft, RoomId, User, UserId};

use crate::error::SendError;
use crate::provider::DocumentStore;

/// Cloneable handle for submitting messages to the document store.
///
/// A successful send does not touch any room stream: the stored message
/// reaches consumers through the room's live query like any other.
#[derive(Clone)]
pub struct MessageSender {
    store: Arc<dyn DocumentStore>,
}

impl MessageSender {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Validate and store one message, returning once the store has
    /// acknowledged the write.
    ///
    /// Invalid input is rejected before the store is contacted.
    pub async fn send(
        &self,
        text: &str,
        sender_id: &UserId,
        sender_name: &str,
        room_id: &RoomId,
    ) -> Result<Message, SendError> {
        let draft = MessageDraft::new(text, sender_id, sender_name, room_id)?;

        match self.store.append(draft).await {
            Ok(message) => {
                tracing::debug!(room = %message.room_id, id = %message.id, "Message stored");
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(room = %room_id, error = %e, "Failed to store message");
                Err(SendError::Write(e))
            }
        }
    }
}

/// The text a user is typing, kept until it has been sent.
///
/// The draft is only cleared after the store acknowledged the message,
/// so a failed send can be retried as is.
pub struct Composer {
    sender: MessageSender,
    draft: String,
}

impl Composer {
    pub fn new(sender: MessageSender) -> Self {
        Self {
            sender,
            draft: String::new(),
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.draft.push_str(text);
    }

    pub async fn submit(&mut self, user: &User, room: &RoomId) -> Result<Message, SendError> {
        let message = self
            .sender
            .send(&self.draft, &user.id, &user.username, room)
            .await?;
        self.draft.clear();
        Ok(message)
    }
}
