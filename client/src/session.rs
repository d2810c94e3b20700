use std::sync::{Arc, Weak};

use parley_protocol::{ChatRoom, RoomCatalog, RoomId, User};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::observable::Observable;
use crate::streams::RoomStreams;

/// The signed-in identity and the selected room.
///
/// Both are observable. Changing rooms has no effect on room streams by
/// itself; consumers react by asking [`RoomStreams`] for the new room.
/// Ending a session (sign-out, or a different user signing in) tears
/// down every room stream, so no live query outlives the session that
/// opened it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionState>,
}

struct SessionState {
    user: Observable<Option<User>>,
    room: Observable<ChatRoom>,
    catalog: RoomCatalog,
    streams: RoomStreams,
}

impl SessionState {
    fn apply_identity(&self, identity: Option<User>) {
        let previous = self.user.get();
        let same_user = previous.as_ref().map(|u| &u.id) == identity.as_ref().map(|u| &u.id);

        if previous.is_some() && !same_user {
            let closed = self.streams.teardown_all();
            tracing::debug!(closed, "Session ended, room streams released");
        }

        self.user.set_if_changed(identity);
    }
}

impl Session {
    pub fn new(catalog: RoomCatalog, streams: RoomStreams) -> Self {
        let room = catalog.first().clone();
        Self {
            inner: Arc::new(SessionState {
                user: Observable::new(None),
                room: Observable::new(room),
                catalog,
                streams,
            }),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.user.get()
    }

    pub fn current_room(&self) -> ChatRoom {
        self.inner.room.get()
    }

    /// Make `room` current. Rooms outside the catalog are refused and
    /// leave the current room unchanged.
    pub fn set_current_room(&self, room: ChatRoom) -> bool {
        if self.inner.catalog.get(&room.id) != Some(&room) {
            tracing::debug!(room = %room.id, "Refusing room outside the catalog");
            return false;
        }
        self.inner.room.set_if_changed(room);
        true
    }

    /// Select a room from the catalog by id
    pub fn select_room(&self, id: &RoomId) -> Option<ChatRoom> {
        let room = self.inner.catalog.get(id)?.clone();
        self.inner.room.set_if_changed(room.clone());
        Some(room)
    }

    pub fn catalog(&self) -> &RoomCatalog {
        &self.inner.catalog
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<User>> {
        self.inner.user.watch()
    }

    pub fn watch_room(&self) -> watch::Receiver<ChatRoom> {
        self.inner.room.watch()
    }

    /// Record the identity reported by the identity provider.
    pub fn apply_identity(&self, identity: Option<User>) {
        self.inner.apply_identity(identity);
    }

    /// Mirror an identity provider's notifications into this session
    /// until the provider goes away or the session is dropped.
    pub fn mirror_identity(&self, mut changes: watch::Receiver<Option<User>>) -> JoinHandle<()> {
        let session: Weak<SessionState> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let identity = changes.borrow_and_update().clone();
                match session.upgrade() {
                    Some(state) => state.apply_identity(identity),
                    None => return,
                }

                if changes.changed().await.is_err() {
                    return;
                }
            }
        })
    }
}
