use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use parley_protocol::{
    BroadcastFrame, Message, MessageDraft, RoomId, merge_messages, normalize_snapshot,
    parse_broadcast_frame,
};
use time::OffsetDateTime;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::error::StoreError;
use crate::provider::{DocumentStore, EventSink, StoreEvent, Subscription};

/// Bus shared by sessions exchanging messages. Carries encoded
/// [`BroadcastFrame`]s.
pub type BroadcastBus = broadcast::Sender<String>;

struct Subscriber {
    room: RoomId,
    sink: EventSink,
}

#[derive(Default)]
struct StoreState {
    log: Vec<Message>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

impl StoreState {
    fn snapshot(&self, room: &RoomId) -> Vec<Message> {
        normalize_snapshot(
            self.log
                .iter()
                .filter(|m| &m.room_id == room)
                .cloned()
                .collect(),
        )
    }

    /// Push the room's full result set to its subscribers, dropping any
    /// whose receiving end is gone.
    fn notify(&mut self, room: &RoomId) {
        let snapshot = self.snapshot(room);
        self.subscribers.retain(|_, subscriber| {
            subscriber.room != *room
                || subscriber
                    .sink
                    .send(StoreEvent::Snapshot(snapshot.clone()))
                    .is_ok()
        });
    }
}

/// In-memory document store.
///
/// Assigns UUIDv7 ids and local timestamps. When linked to a
/// [`BroadcastBus`] it publishes its log after every append and merges
/// the logs other sessions publish, deduplicating by message id.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    origin: String,
    bus: Option<BroadcastBus>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            origin: Uuid::now_v7().to_string(),
            bus: None,
        }
    }

    /// Create a store exchanging messages with every other store on
    /// `bus`. Must be called from within a Tokio runtime.
    pub fn linked(bus: &BroadcastBus) -> Self {
        let store = Self {
            bus: Some(bus.clone()),
            ..Self::new()
        };

        let frames = bus.subscribe();
        let state = Arc::downgrade(&store.state);
        tokio::spawn(listen(state, store.origin.clone(), frames));

        store
    }

    /// Identifies this store's frames on the bus
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Every message known to this store, in arrival order
    pub fn messages(&self) -> Vec<Message> {
        self.lock().log.clone()
    }

    /// Merge messages received from another session. Returns how many
    /// were new.
    pub fn merge_remote(&self, messages: Vec<Message>) -> usize {
        merge_into(&mut self.lock(), messages)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, log: Vec<Message>) {
        let Some(bus) = &self.bus else {
            return;
        };

        match BroadcastFrame::new(self.origin.clone(), log).to_wire_format() {
            // No listening peers is not an error
            Ok(wire) => {
                let _ = bus.send(wire);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to broadcast messages"),
        }
    }
}

fn merge_into(state: &mut StoreState, messages: Vec<Message>) -> usize {
    let added = merge_messages(&mut state.log, messages);

    let mut rooms: Vec<&RoomId> = added.iter().map(|m| &m.room_id).collect();
    rooms.sort();
    rooms.dedup();
    for room in rooms {
        state.notify(room);
    }

    added.len()
}

async fn listen(
    state: Weak<Mutex<StoreState>>,
    origin: String,
    mut frames: broadcast::Receiver<String>,
) {
    loop {
        let raw = match frames.recv().await {
            Ok(raw) => raw,
            Err(RecvError::Lagged(skipped)) => {
                // Frames carry whole logs, so the next one catches us up
                tracing::warn!(skipped, "Broadcast listener lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let Some(state) = state.upgrade() else {
            return;
        };

        match parse_broadcast_frame(&raw) {
            Ok(frame) if frame.origin == origin => {}
            Ok(frame) => {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                let added = merge_into(&mut state, frame.messages);
                if added > 0 {
                    tracing::debug!(added, origin = %frame.origin, "Merged remote messages");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed broadcast frame"),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn append(&self, draft: MessageDraft) -> Result<Message, StoreError> {
        let message = draft.into_message(Uuid::now_v7().to_string(), OffsetDateTime::now_utc());

        let log = {
            let mut state = self.lock();
            state.log.push(message.clone());
            state.notify(&message.room_id);
            state.log.clone()
        };
        self.publish(log);

        Ok(message)
    }

    async fn subscribe(&self, room: &RoomId, sink: EventSink) -> Result<Subscription, StoreError> {
        let mut state = self.lock();

        sink.send(StoreEvent::Snapshot(state.snapshot(room)))
            .map_err(|_| StoreError::Closed)?;

        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                room: room.clone(),
                sink,
            },
        );

        let weak = Arc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        }))
    }
}
