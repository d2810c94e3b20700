use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{Message, ParseError};

/// Full message log published by one session to its peers.
///
/// Peers sharing a broadcast bus exchange their whole log on every
/// append and merge what they receive by message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastFrame {
    /// Session that published the frame, so it can skip its own echo
    pub origin: String,
    pub messages: Vec<Message>,
}

impl BroadcastFrame {
    pub fn new(origin: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            origin: origin.into(),
            messages,
        }
    }

    /// Serialize to wire format (a single JSON document)
    pub fn to_wire_format(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode broadcast frame")
    }
}

/// Parse a frame received from the broadcast bus
pub fn parse_broadcast_frame(frame: &str) -> Result<BroadcastFrame> {
    let frame = frame.trim();
    if frame.is_empty() {
        return Err(ParseError::EmptyFrame.into());
    }

    serde_json::from_str(frame).context("Failed to parse broadcast frame")
}
