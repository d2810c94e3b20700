use parley_protocol::{ChatRoom, RoomId, ValidationError};

use super::mock::{MockIdentity, MockStore};
use super::{WAIT, eventually, fast_policy, ids, message};
use crate::ChatClient;
use crate::config::ClientConfig;
use crate::error::SendError;
use crate::feed::{RoomFeed, RoomView};

fn config() -> ClientConfig {
    ClientConfig {
        rooms: vec![
            ChatRoom::new("Lobby", "Lobby", "Landing room"),
            ChatRoom::new("General", "General", "General discussion"),
        ],
        reconnect: fast_policy(),
        identity_path: None,
    }
}

#[tokio::test]
async fn test_send_and_receive_echo() {
    let store = MockStore::new();
    let identity = MockIdentity::new();
    let client = ChatClient::new(&config(), identity.clone(), store.clone()).unwrap();
    let general = RoomId::new("General");

    let alice = client.login("Alice").await.unwrap();
    assert_eq!(client.select_room(&general).map(|r| r.name), Some("General".to_string()));

    let mut feed = client.current_feed();
    let view = next_view(&mut feed).await;
    assert_eq!(view.room.id, general);
    assert!(view.messages.is_empty());

    client.send("hello").await.unwrap();
    let appends = store.appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].text, "hello");
    assert_eq!(appends[0].user_id, alice.id);
    assert_eq!(appends[0].room_id, general);
    assert!(feed.current().messages.is_empty());

    eventually(|| store.live_count(&general) == 1).await;
    let mut m1 = message("m1", "Alice", "hello", "General", 0);
    m1.user_id = alice.id.clone();
    store.push(&general, vec![m1.clone()]);

    let view = next_view(&mut feed).await;
    assert_eq!(*view.messages, vec![m1.clone()]);

    let m2 = message("m2", "Bob", "hi again", "General", 3);
    store.push(&general, vec![m1, m2]);

    let view = next_view(&mut feed).await;
    assert_eq!(ids(&view.messages), vec!["m1", "m2"]);
    assert_eq!(view.messages[1].username, "Bob");
}

#[tokio::test]
async fn test_feed_follows_room_changes() {
    let store = MockStore::new();
    let identity = MockIdentity::new();
    let client = ChatClient::new(&config(), identity.clone(), store.clone()).unwrap();
    let lobby = RoomId::new("Lobby");
    let general = RoomId::new("General");

    client.login("Alice").await.unwrap();
    let mut feed = client.current_feed();
    assert_eq!(next_view(&mut feed).await.room.id, lobby);

    eventually(|| store.live_count(&lobby) == 1).await;
    store.push(&lobby, vec![message("l1", "Alice", "anyone?", "Lobby", 0)]);
    assert_eq!(ids(&next_view(&mut feed).await.messages), vec!["l1"]);

    client.select_room(&general);
    let view = next_view(&mut feed).await;
    assert_eq!(view.room.id, general);
    assert!(view.messages.is_empty());

    eventually(|| store.live_count(&general) == 1).await;
    store.push(&general, vec![message("g1", "Bob", "over here", "General", 1)]);
    let view = next_view(&mut feed).await;
    assert_eq!(view.room.id, general);
    assert_eq!(ids(&view.messages), vec!["g1"]);

    // Switching rooms does not release the previous room
    assert!(client.streams().is_active(&lobby));
    assert_eq!(store.subscribe_count(&lobby), 1);
}

#[tokio::test]
async fn test_feed_ends_on_logout() {
    let store = MockStore::new();
    let identity = MockIdentity::new();
    let client = ChatClient::new(&config(), identity.clone(), store.clone()).unwrap();

    client.login("Alice").await.unwrap();
    let mut feed = client.current_feed();
    next_view(&mut feed).await;

    client.logout().await.unwrap();
    let ended = tokio::time::timeout(WAIT, feed.next()).await.unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn test_send_requires_login() {
    let store = MockStore::new();
    let identity = MockIdentity::new();
    let client = ChatClient::new(&config(), identity.clone(), store.clone()).unwrap();

    assert!(matches!(
        client.send("hello").await,
        Err(SendError::Validation(ValidationError::MissingSender))
    ));
    assert!(store.appends().is_empty());
}

#[tokio::test]
async fn test_empty_catalog_rejected() {
    let config = ClientConfig {
        rooms: Vec::new(),
        ..ClientConfig::default()
    };

    let result = ChatClient::new(&config, MockIdentity::new(), MockStore::new());
    assert!(matches!(result, Err(ValidationError::EmptyCatalog)));
}

async fn next_view(feed: &mut RoomFeed) -> RoomView {
    tokio::time::timeout(WAIT, feed.next())
        .await
        .expect("timed out waiting for feed")
        .expect("feed ended")
}
