//! In-process stand-in for the server: message history, contact edges,
//! accounts and a realtime feed, with switches to make calls fail.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use parley_types::models::Message;

use crate::error::{ClientError, Result};
use crate::session::Identity;
use crate::store::{AuthService, ContactStore, MessageStore, NewMessage, RealtimeSource, Subscription};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    passwords: HashMap<String, String>,
    /// Directed (owner, contact) rows.
    contacts: BTreeSet<(String, String)>,
    messages: Vec<Message>,
    last_id: i64,
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
    fail_inserts: bool,
    fail_fetches: bool,
    fail_subscribe: bool,
    calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.inner().passwords.insert(username.to_string(), password.to_string());
    }

    /// Store a message as-is (keeping its id and timestamp) without notifying
    /// subscribers. Later inserts get ids above every seeded id.
    pub fn seed_message(&self, message: Message) {
        let mut inner = self.inner();
        inner.last_id = inner.last_id.max(message.id);
        inner.messages.push(message);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.inner().fail_inserts = fail;
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.inner().fail_fetches = fail;
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner().fail_subscribe = fail;
    }

    /// Number of stored directed contact rows.
    pub fn contact_rows(&self) -> usize {
        self.inner().contacts.len()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner().messages.clone()
    }

    /// Number of store operations attempted so far.
    pub fn calls(&self) -> usize {
        self.inner().calls
    }

    /// Subscribers whose receiving end is still alive.
    pub fn live_subscriptions(&self) -> usize {
        let mut inner = self.inner();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

fn unavailable() -> ClientError {
    ClientError::Store { status: 503 }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_conversation(&self, me: &str, other: &str) -> Result<Vec<Message>> {
        let mut inner = self.inner();
        inner.calls += 1;
        if inner.fail_fetches {
            return Err(unavailable());
        }
        let mut found: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.is_between(me, other))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let mut inner = self.inner();
        inner.calls += 1;
        if inner.fail_inserts {
            return Err(unavailable());
        }
        inner.last_id += 1;
        let stored = Message {
            id: inner.last_id,
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            content: message.content.clone(),
            created_at: Utc::now(),
        };
        inner.messages.push(stored.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(stored.clone()).is_ok());
        Ok(stored)
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn list_contacts(&self, owner: &str) -> Result<Vec<String>> {
        let mut inner = self.inner();
        inner.calls += 1;
        if inner.fail_fetches {
            return Err(unavailable());
        }
        Ok(inner
            .contacts
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn add_contact(&self, owner: &str, contact: &str) -> Result<()> {
        let mut inner = self.inner();
        inner.calls += 1;
        if inner.fail_inserts {
            return Err(unavailable());
        }
        inner.contacts.insert((owner.to_string(), contact.to_string()));
        inner.contacts.insert((contact.to_string(), owner.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AuthService for MemoryStore {
    async fn register(&self, username: &str, password: &str) -> Result<()> {
        let mut inner = self.inner();
        inner.calls += 1;
        if inner.passwords.contains_key(username) {
            return Err(ClientError::AccountExists);
        }
        inner.passwords.insert(username.to_string(), password.to_string());
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let mut inner = self.inner();
        inner.calls += 1;
        match inner.passwords.get(username) {
            Some(stored) if stored == password => Ok(Identity::named(username)),
            _ => Err(ClientError::InvalidCredentials),
        }
    }
}

#[async_trait]
impl RealtimeSource for MemoryStore {
    async fn subscribe(&self, _me: &str, _counterpart: &str) -> Result<Subscription> {
        let mut inner = self.inner();
        if inner.fail_subscribe {
            return Err(ClientError::Transport("realtime unavailable".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        Ok(Subscription::new(rx))
    }
}
