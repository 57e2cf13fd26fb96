//! Seams between the client core and its external collaborators.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use parley_types::models::Message;

use crate::error::Result;
use crate::session::Identity;

/// A message to be persisted. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Every message between `me` and `other`, oldest first.
    async fn fetch_conversation(&self, me: &str, other: &str) -> Result<Vec<Message>>;

    /// Persist `message` and return the stored record.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contact usernames of `owner`, ascending.
    async fn list_contacts(&self, owner: &str) -> Result<Vec<String>>;

    /// Store the edge in both directions.
    async fn add_contact(&self, owner: &str, contact: &str) -> Result<()>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, username: &str, password: &str) -> Result<()>;
    async fn login(&self, username: &str, password: &str) -> Result<Identity>;
}

#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// Start listening for message inserts on behalf of `me` while the
    /// conversation with `counterpart` is open.
    async fn subscribe(&self, me: &str, counterpart: &str) -> Result<Subscription>;
}

/// A live realtime feed. Dropping it releases the listener behind it.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Message>,
    task: Option<AbortHandle>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { rx, task: None }
    }

    /// Feed backed by a spawned listener task, aborted on drop.
    pub fn with_task(rx: mpsc::UnboundedReceiver<Message>, task: AbortHandle) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Next insert, or `None` once the listener has gone away.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// An already-buffered insert, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
