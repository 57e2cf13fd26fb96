use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted direct message. `id` and `created_at` are assigned by the
/// server at insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True if this message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }

    /// True if `username` sent or received this message.
    pub fn involves(&self, username: &str) -> bool {
        self.sender == username || self.receiver == username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, receiver: &str) -> Message {
        Message {
            id: 1,
            sender: sender.into(),
            receiver: receiver.into(),
            content: "hi".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn is_between_either_direction() {
        assert!(msg("alice", "bob").is_between("alice", "bob"));
        assert!(msg("bob", "alice").is_between("alice", "bob"));
        assert!(!msg("alice", "carol").is_between("alice", "bob"));
        assert!(!msg("bob", "bob").is_between("alice", "bob"));
    }

    #[test]
    fn involves_sender_or_receiver() {
        let m = msg("alice", "bob");
        assert!(m.involves("alice"));
        assert!(m.involves("bob"));
        assert!(!m.involves("carol"));
    }
}
