use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{RoomId, UserId, ValidationError};

/// A chat message as stored by the document store.
///
/// Messages are immutable once created. `id` is unique across all rooms
/// and is the key used to deduplicate messages arriving from several
/// sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub user_id: UserId,
    /// Sender display name captured at send time
    pub username: String,
    pub room_id: RoomId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A message that passed local validation but has not been stored yet.
///
/// The store assigns `id` and `timestamp` when it appends the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub text: String,
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
}

impl MessageDraft {
    /// Validate an outgoing message. The text is stored trimmed.
    pub fn new(
        text: &str,
        user_id: &UserId,
        username: &str,
        room_id: &RoomId,
    ) -> Result<Self, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if room_id.is_empty() {
            return Err(ValidationError::MissingRoom);
        }
        if user_id.is_empty() {
            return Err(ValidationError::MissingSender);
        }

        Ok(Self {
            text: text.to_string(),
            user_id: user_id.clone(),
            username: username.to_string(),
            room_id: room_id.clone(),
        })
    }

    pub fn into_message(self, id: String, timestamp: OffsetDateTime) -> Message {
        Message {
            id,
            text: self.text,
            user_id: self.user_id,
            username: self.username,
            room_id: self.room_id,
            timestamp,
        }
    }
}

/// Bring a delivered result set into canonical form: one entry per id
/// (the last delivered copy wins), ordered by timestamp ascending.
///
/// The sort is stable, so messages sharing a timestamp keep their
/// delivery order.
pub fn normalize_snapshot(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    let mut unique: Vec<Message> = messages
        .into_iter()
        .rev()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    unique.reverse();
    unique.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    unique
}

/// Append the messages from `incoming` whose ids are not yet in `log`.
///
/// Returns the newly added messages in their incoming order. Existing
/// entries are never replaced since messages are immutable.
pub fn merge_messages(log: &mut Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    let mut known: HashSet<String> = log.iter().map(|m| m.id.clone()).collect();
    let added: Vec<Message> = incoming
        .into_iter()
        .filter(|m| known.insert(m.id.clone()))
        .collect();
    log.extend(added.iter().cloned());
    added
}
