//! Wire messages on the progress channel.
//!
//! Server events arrive as `{ "event": "...", "data": { ... } }` frames on a
//! single ordered stream and map one-to-one onto the presenter's
//! [`ProgressEvent`]s. The client sends a hello frame after connecting and a
//! periodic heartbeat while idle.

use procura_core::ProgressEvent;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "START_TOAST")]
    StartToast { message: String },
    #[serde(rename = "PROGRESS_UPDATE")]
    ProgressUpdate { percent_complete: u8 },
    #[serde(rename = "SIGNAL_RESET")]
    SignalReset {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "NO_USER_FOUND")]
    NoUserFound { message: String },
    #[serde(rename = "USER_FOUND")]
    UserFound { message: String },
    #[serde(rename = "CONNECTION_TIMEOUT")]
    ConnectionTimeout { message: String },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl ServerMessage {
    pub fn into_progress_event(self) -> ProgressEvent {
        match self {
            ServerMessage::StartToast { message } => ProgressEvent::Start { message },
            ServerMessage::ProgressUpdate { percent_complete } => {
                ProgressEvent::Progress { percent: percent_complete }
            }
            ServerMessage::SignalReset { message } => ProgressEvent::Reset { message },
            ServerMessage::NoUserFound { message } => ProgressEvent::UserNotFound { message },
            ServerMessage::UserFound { message } => ProgressEvent::UserFound { message },
            ServerMessage::ConnectionTimeout { message } => {
                ProgressEvent::ConnectionTimeout { message }
            }
            ServerMessage::Error { message } => ProgressEvent::Error { message },
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Initial handshake after connect.
    Hello { client: String, version: String },
    /// Keep-alive while no server traffic is flowing.
    Heartbeat,
}

impl ClientMessage {
    pub fn hello() -> Self {
        ClientMessage::Hello {
            client: "procura".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
