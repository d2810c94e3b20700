use thiserror::Error;

pub mod broadcast;
pub mod message;
pub mod room;
pub mod user;


pub use broadcast::{BroadcastFrame, parse_broadcast_frame};
pub use message::{Message, MessageDraft, merge_messages, normalize_snapshot};
pub use room::{ChatRoom, RoomCatalog, RoomId};
pub use user::{User, UserId};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Empty broadcast frame")]
    EmptyFrame,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text cannot be empty")]
    EmptyText,

    #[error("No room selected")]
    MissingRoom,

    #[error("No sender identity")]
    MissingSender,

    #[error("Room catalog cannot be empty")]
    EmptyCatalog,
}
