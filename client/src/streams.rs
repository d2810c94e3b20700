//! Room-scoped live message streams.
//!
//! [`RoomStreams`] keeps at most one live query per room against the
//! [`DocumentStore`], however many consumers ask for the room. Every
//! consumer gets a [`LiveCollection`] sharing the same published value.
//!
//! Each room entry carries a generation number. A background pump task
//! only publishes into the entry of its own generation, so a push that was
//! already in flight when the room was torn down can never show up in a
//! stream created afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::Stream;
use parley_protocol::{Message, RoomId, normalize_snapshot};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ReconnectPolicy;
use crate::error::StoreError;
use crate::observable::Observable;
use crate::provider::{DocumentStore, StoreEvent, Subscription};

/// One published version of a room's messages
pub type Messages = Arc<Vec<Message>>;

/// Health of a room's live query, for connectivity indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Waiting for the first subscription to open
    Connecting,
    Live,
    /// The subscription broke; retry `attempt` is pending
    Reconnecting { attempt: usize },
    /// Retries are exhausted. The last known messages stay visible.
    Failed,
}

struct RoomEntry {
    generation: u64,
    messages: Observable<Messages>,
    status: Observable<StreamStatus>,
    subscription: Option<Subscription>,
    pump: Option<JoinHandle<()>>,
}

impl RoomEntry {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            messages: Observable::new(Arc::new(Vec::new())),
            status: Observable::new(StreamStatus::Connecting),
            subscription: None,
            pump: None,
        }
    }

    fn collection(&self, room: &RoomId) -> LiveCollection {
        LiveCollection {
            room: room.clone(),
            messages: self.messages.watch(),
            status: self.status.watch(),
        }
    }

    /// Cancel the live query and stop the pump. Observers are closed when
    /// the entry is dropped at the end of this call.
    fn close(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

struct Registry {
    rooms: Mutex<HashMap<RoomId, RoomEntry>>,
    next_generation: AtomicU64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, RoomEntry>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let rooms = self.rooms.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in rooms.drain() {
            entry.close();
        }
    }
}

/// Run `f` on the room's entry if it still belongs to `generation`.
///
/// Returns `None` when the room was torn down (or recreated) since the
/// caller's pump started; `f` is then dropped without being called.
fn with_entry<R>(
    registry: &Weak<Registry>,
    room: &RoomId,
    generation: u64,
    f: impl FnOnce(&mut RoomEntry) -> R,
) -> Option<R> {
    let registry = registry.upgrade()?;
    let mut rooms = registry.lock();
    match rooms.get_mut(room) {
        Some(entry) if entry.generation == generation => Some(f(entry)),
        _ => None,
    }
}

/// Registry of live per-room message streams.
///
/// Cloning is cheap; clones share the same rooms. Streams are created on
/// first request and live until [`RoomStreams::teardown`] or
/// [`RoomStreams::teardown_all`]. There is no reference counting.
#[derive(Clone)]
pub struct RoomStreams {
    registry: Arc<Registry>,
    store: Arc<dyn DocumentStore>,
    policy: ReconnectPolicy,
}

impl RoomStreams {
    pub fn new(store: Arc<dyn DocumentStore>, policy: ReconnectPolicy) -> Self {
        Self {
            registry: Arc::new(Registry {
                rooms: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
            store,
            policy,
        }
    }

    /// Live view of a room's messages.
    ///
    /// The first request for a room opens its live query in a background
    /// task; later requests share it. Must be called from within a Tokio
    /// runtime.
    pub fn stream_for(&self, room: &RoomId) -> LiveCollection {
        let mut rooms = self.registry.lock();
        if let Some(entry) = rooms.get(room) {
            return entry.collection(room);
        }

        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entry = RoomEntry::new(generation);
        let collection = entry.collection(room);

        entry.pump = Some(tokio::spawn(pump_room(
            Arc::downgrade(&self.registry),
            self.store.clone(),
            self.policy.clone(),
            room.clone(),
            generation,
        )));
        rooms.insert(room.clone(), entry);

        tracing::debug!(room = %room, generation, "Room stream created");
        collection
    }

    /// Cancel a room's live query and close its observers.
    ///
    /// Returns whether the room was being tracked. Tearing down an
    /// untracked room does nothing.
    pub fn teardown(&self, room: &RoomId) -> bool {
        let entry = self.registry.lock().remove(room);
        match entry {
            Some(entry) => {
                tracing::debug!(room = %room, generation = entry.generation, "Room stream torn down");
                entry.close();
                true
            }
            None => false,
        }
    }

    /// Tear down every tracked room. Returns how many were closed.
    pub fn teardown_all(&self) -> usize {
        let entries: Vec<(RoomId, RoomEntry)> = self.registry.lock().drain().collect();
        let count = entries.len();
        for (room, entry) in entries {
            tracing::debug!(room = %room, generation = entry.generation, "Room stream torn down");
            entry.close();
        }
        count
    }

    pub fn is_active(&self, room: &RoomId) -> bool {
        self.registry.lock().contains_key(room)
    }

    pub fn active_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.registry.lock().keys().cloned().collect();
        rooms.sort();
        rooms
    }
}

/// Keep one room's live query open, publishing every snapshot, until the
/// room's entry is gone or retries run out.
async fn pump_room(
    registry: Weak<Registry>,
    store: Arc<dyn DocumentStore>,
    policy: ReconnectPolicy,
    room: RoomId,
    generation: u64,
) {
    let mut attempt = 0;

    loop {
        let (sink, mut events) = mpsc::unbounded_channel();

        match store.subscribe(&room, sink).await {
            Ok(subscription) => {
                // A stale generation drops the closure, cancelling the subscription.
                let installed = with_entry(&registry, &room, generation, move |entry| {
                    entry.subscription = Some(subscription);
                    entry.status.set(StreamStatus::Live);
                });
                if installed.is_none() {
                    return;
                }

                tracing::debug!(room = %room, generation, "Room subscription opened");

                let error = loop {
                    match events.recv().await {
                        Some(StoreEvent::Snapshot(records)) => {
                            // Only a subscription that delivers counts as recovered.
                            attempt = 0;
                            let snapshot = Arc::new(normalize_snapshot(records));
                            let published = with_entry(&registry, &room, generation, |entry| {
                                entry.messages.set(snapshot);
                            });
                            if published.is_none() {
                                return;
                            }
                        }
                        Some(StoreEvent::Error(e)) => break e,
                        None => break StoreError::Closed,
                    }
                };

                match with_entry(&registry, &room, generation, |entry| entry.subscription.take()) {
                    Some(broken) => drop(broken),
                    None => return,
                }

                tracing::warn!(
                    room = %room,
                    error = %error,
                    "Room subscription dropped, keeping last known messages"
                );
            }
            Err(e) => {
                tracing::warn!(
                    room = %room,
                    attempt = attempt,
                    error = %e,
                    "Failed to open room subscription"
                );
            }
        }

        attempt += 1;
        if policy.exhausted(attempt) {
            tracing::error!(
                room = %room,
                max_attempts = ?policy.max_attempts,
                "Giving up on room subscription"
            );
            with_entry(&registry, &room, generation, |entry| {
                entry.status.set(StreamStatus::Failed);
            });
            return;
        }

        let waiting = with_entry(&registry, &room, generation, |entry| {
            entry.status.set(StreamStatus::Reconnecting { attempt });
        });
        if waiting.is_none() {
            return;
        }

        tokio::time::sleep(policy.delay_for(attempt)).await;
    }
}

/// A consumer's handle on one room's live messages.
///
/// Reading never fails: while the underlying query is reconnecting the
/// last known messages stay visible. The collection only ends when its
/// room is torn down.
#[derive(Debug, Clone)]
pub struct LiveCollection {
    room: RoomId,
    messages: watch::Receiver<Messages>,
    status: watch::Receiver<StreamStatus>,
}

impl LiveCollection {
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Latest known messages, ordered by timestamp
    pub fn current(&self) -> Messages {
        self.messages.borrow().clone()
    }

    /// Wait for the next published version.
    ///
    /// Returns `None` once the room has been torn down.
    pub async fn changed(&mut self) -> Option<Messages> {
        self.messages.changed().await.ok()?;
        Some(self.messages.borrow_and_update().clone())
    }

    pub fn is_closed(&self) -> bool {
        self.messages.has_changed().is_err()
    }

    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    /// Wait for the connection status to change. `None` after teardown.
    pub async fn status_changed(&mut self) -> Option<StreamStatus> {
        self.status.changed().await.ok()?;
        Some(*self.status.borrow_and_update())
    }

    /// Stream starting with the latest value, followed by every update,
    /// ending at teardown.
    pub fn into_stream(mut self) -> impl Stream<Item = Messages> + Send + 'static {
        let first = self.messages.borrow_and_update().clone();
        futures_util::stream::unfold((Some(first), self), |(pending, mut collection)| async move {
            if let Some(messages) = pending {
                return Some((messages, (None, collection)));
            }
            let messages = collection.changed().await?;
            Some((messages, (None, collection)))
        })
    }
}
