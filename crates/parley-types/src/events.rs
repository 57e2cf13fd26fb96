use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message row was inserted
    MessageInsert(Message),
}

impl GatewayEvent {
    /// Returns true if the event should be delivered to `username`.
    /// Message inserts only reach their sender and receiver.
    pub fn is_visible_to(&self, username: &str) -> bool {
        match self {
            Self::MessageInsert(message) => message.involves(username),
            Self::Ready { username: u, .. } => u == username,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
