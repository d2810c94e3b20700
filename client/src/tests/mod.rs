mod scenario;

use std::time::Duration;

use parley_protocol::{Message, RoomId, UserId};
use time::OffsetDateTime;
use time::macros::datetime;

use crate::config::ReconnectPolicy;
use crate::streams::{LiveCollection, Messages};

const WAIT: Duration = Duration::from_secs(2);

fn message(id: &str, username: &str, text: &str, room: &str, offset_secs: i64) -> Message {
    let base: OffsetDateTime = datetime!(2024-05-01 10:00:00 UTC);
    Message {
        id: id.to_string(),
        text: text.to_string(),
        user_id: UserId::new(format!("uid-{}", username.to_lowercase())),
        username: username.to_string(),
        room_id: RoomId::new(room),
        timestamp: base + time::Duration::seconds(offset_secs),
    }
}

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: None,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    }
}

/// Poll `condition` until it holds, failing the test after a while
async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within {:?}", WAIT);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

async fn next_value(collection: &mut LiveCollection) -> Messages {
    tokio::time::timeout(WAIT, collection.changed())
        .await
        .expect("timed out waiting for messages")
        .expect("stream closed")
}

fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}
