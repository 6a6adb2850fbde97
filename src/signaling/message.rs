//! Signaling wire messages
//!
//! JSON text frames exchanged with a listener:
//!
//! ```text
//! listener → relay   {"type": "offer", "sdp": "v=0..."}
//! relay → listener   {"type": "answer", "sdp": "v=0..."}
//! relay → listener   {"type": "error", "message": "..."}
//! ```

use serde::{Deserialize, Serialize};

/// A message received from the listener
///
/// Kept loose so unknown message types can be recognized and skipped
/// rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
}

impl InboundMessage {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: "offer".to_string(),
            sdp: Some(sdp.into()),
        }
    }

    pub fn is_offer(&self) -> bool {
        self.kind == "offer"
    }
}

/// A message sent to the listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Answer { sdp: String },
    Error { message: String },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
