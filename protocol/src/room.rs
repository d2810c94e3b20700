use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub name: String,
    pub description: String,
}

impl ChatRoom {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: RoomId::new(id),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Static list of rooms, fixed for the lifetime of the process.
///
/// Never empty: the first entry is the default room when nothing
/// has been selected yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCatalog {
    rooms: Vec<ChatRoom>,
}

impl RoomCatalog {
    pub fn new(rooms: Vec<ChatRoom>) -> Result<Self, ValidationError> {
        if rooms.is_empty() {
            return Err(ValidationError::EmptyCatalog);
        }
        Ok(Self { rooms })
    }

    /// The built-in catalog
    pub fn builtin() -> Self {
        Self {
            rooms: builtin_rooms(),
        }
    }

    /// Default room
    pub fn first(&self) -> &ChatRoom {
        &self.rooms[0]
    }

    pub fn get(&self, id: &RoomId) -> Option<&ChatRoom> {
        self.rooms.iter().find(|room| &room.id == id)
    }

    pub fn rooms(&self) -> &[ChatRoom] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

pub fn builtin_rooms() -> Vec<ChatRoom> {
    vec![
        ChatRoom::new("1", "General", "General discussion"),
        ChatRoom::new("2", "Random", "Random topics"),
        ChatRoom::new("3", "Tech", "Technology discussion"),
    ]
}
