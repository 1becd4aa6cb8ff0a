//! Realtime wire protocol.
//!
//! | Direction | Shape |
//! |---|---|
//! | client → server | `{messageId, command: "subscribe" \| "unsubscribe", topic}` |
//! | client → server | `{messageId, command: "publish", topic, message}` |
//! | server → client | `{messageId, success: true}` |
//! | server → client | `{messageId, error: true, message}` |
//! | server → client | `{remoteMessage: true, topic, message}` |

use pubsub_core::{BusError, BusResult};
use serde_json::{json, Value};

/// A command from a client, correlated by `message_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientCommand {
    pub message_id: String,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, message: Value },
}

impl Command {
    pub fn topic(&self) -> &str {
        match self {
            Command::Subscribe { topic }
            | Command::Unsubscribe { topic }
            | Command::Publish { topic, .. } => topic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::Publish { .. } => "publish",
        }
    }
}

impl ClientCommand {
    /// Parse an inbound frame.
    ///
    /// Frames without a string `messageId` or `command`, or with an unknown
    /// command, are `Protocol` errors. A missing or non-string `topic` is
    /// read as the empty topic, which the bus rejects as invalid, so the
    /// client still gets an error response for it.
    pub fn parse(frame: &Value) -> BusResult<Self> {
        let message_id = frame
            .get("messageId")
            .and_then(Value::as_str)
            .ok_or_else(|| BusError::protocol("missing messageId"))?
            .to_string();
        let command = frame
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| BusError::protocol("missing command"))?;
        let topic = frame
            .get("topic")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let command = match command {
            "subscribe" => Command::Subscribe { topic },
            "unsubscribe" => Command::Unsubscribe { topic },
            "publish" => Command::Publish {
                topic,
                message: frame.get("message").cloned().unwrap_or(Value::Null),
            },
            other => return Err(BusError::protocol(format!("unknown command {other:?}"))),
        };

        Ok(Self {
            message_id,
            command,
        })
    }
}

pub fn success_response(message_id: &str) -> Value {
    json!({
        "messageId": message_id,
        "success": true
    })
}

pub fn error_response(message_id: &str, message: &str) -> Value {
    json!({
        "messageId": message_id,
        "error": true,
        "message": message
    })
}

/// A delivered bus message pushed to a subscribed client.
pub fn push_message(topic: &str, message: &Value) -> Value {
    json!({
        "remoteMessage": true,
        "topic": topic,
        "message": message
    })
}
