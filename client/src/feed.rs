use parley_protocol::ChatRoom;
use tokio::sync::watch;

use crate::session::Session;
use crate::streams::{LiveCollection, Messages, RoomStreams};

/// Messages of one room, as seen at one point in time
#[derive(Debug, Clone)]
pub struct RoomView {
    pub room: ChatRoom,
    pub messages: Messages,
}

/// Follows the session's current room.
///
/// Yields a view whenever the room's messages change, and switches to
/// the new room's stream when another room is selected. The feed ends
/// when the stream it follows is torn down, e.g. on sign-out.
pub struct RoomFeed {
    streams: RoomStreams,
    rooms: watch::Receiver<ChatRoom>,
    room: ChatRoom,
    collection: LiveCollection,
    pending_initial: bool,
}

impl RoomFeed {
    pub fn new(session: &Session, streams: RoomStreams) -> Self {
        let mut rooms = session.watch_room();
        let room = rooms.borrow_and_update().clone();
        let collection = streams.stream_for(&room.id);

        Self {
            streams,
            rooms,
            room,
            collection,
            pending_initial: true,
        }
    }

    pub fn room(&self) -> &ChatRoom {
        &self.room
    }

    pub fn current(&self) -> RoomView {
        RoomView {
            room: self.room.clone(),
            messages: self.collection.current(),
        }
    }

    /// The next view; the first call returns the current one immediately.
    pub async fn next(&mut self) -> Option<RoomView> {
        if self.pending_initial {
            self.pending_initial = false;
            return Some(self.current());
        }

        tokio::select! {
            changed = self.rooms.changed() => {
                changed.ok()?;
                let room = self.rooms.borrow_and_update().clone();
                if room.id != self.room.id {
                    self.collection = self.streams.stream_for(&room.id);
                }
                self.room = room;
                Some(self.current())
            }
            messages = self.collection.changed() => {
                let messages = messages?;
                Some(RoomView {
                    room: self.room.clone(),
                    messages,
                })
            }
        }
    }
}
