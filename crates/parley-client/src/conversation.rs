//! Per-conversation reconciliation.
//!
//! A [`Conversation`] owns the ordered view of one local user's exchange with
//! one counterpart. Three sources feed it: the history fetched when the
//! conversation opens, optimistic local sends, and realtime inserts pushed by
//! the server. Every stored message id appears in the view at most once.

use std::collections::HashSet;

use chrono::{DateTime, Local, Utc};
use tracing::debug;

use parley_types::models::Message;

use crate::error::Result;
use crate::store::{NewMessage, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Sent locally, not yet confirmed by the store.
    Pending { local_key: u64 },
    Confirmed { id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEntry {
    pub state: EntryState,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ViewEntry {
    fn confirmed(message: Message) -> Self {
        Self {
            state: EntryState::Confirmed { id: message.id },
            sender: message.sender,
            receiver: message.receiver,
            content: message.content,
            created_at: message.created_at,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self.state {
            EntryState::Confirmed { id } => Some(id),
            EntryState::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending { .. })
    }

    fn has_key(&self, key: u64) -> bool {
        self.state == EntryState::Pending { local_key: key }
    }
}

/// Handle for an in-flight send, returned by [`Conversation::begin_send`].
#[derive(Debug, PartialEq, Eq)]
pub struct PendingSend {
    local_key: u64,
}

impl PendingSend {
    pub fn local_key(&self) -> u64 {
        self.local_key
    }
}

/// What applying a realtime insert did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Not part of this conversation.
    Ignored,
    /// Id already in the view.
    Duplicate,
    /// Confirmed a pending local send.
    Confirmed,
    Appended,
}

impl Applied {
    pub fn changed_view(self) -> bool {
        matches!(self, Applied::Confirmed | Applied::Appended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub direction: Direction,
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Local wall-clock `HH:MM`.
    pub time_label: String,
    pub pending: bool,
}

pub struct Conversation {
    me: String,
    counterpart: String,
    view: Vec<ViewEntry>,
    subscription: Option<Subscription>,
    next_key: u64,
}

impl Conversation {
    pub fn new(me: impl Into<String>, counterpart: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            counterpart: counterpart.into(),
            view: Vec::new(),
            subscription: None,
            next_key: 0,
        }
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn counterpart(&self) -> &str {
        &self.counterpart
    }

    pub fn view(&self) -> &[ViewEntry] {
        &self.view
    }

    pub fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscription_mut(&mut self) -> Option<&mut Subscription> {
        self.subscription.as_mut()
    }

    /// Release the realtime feed, keeping the view.
    pub fn clear_subscription(&mut self) {
        self.subscription = None;
    }

    fn position_of_id(&self, id: i64) -> Option<usize> {
        self.view.iter().position(|e| e.id() == Some(id))
    }

    fn position_of_key(&self, key: u64) -> Option<usize> {
        self.view.iter().position(|e| e.has_key(key))
    }

    /// Replace the whole view with fetched history, oldest first.
    pub fn replace_history(&mut self, history: Vec<Message>) {
        let mut seen = HashSet::with_capacity(history.len());
        let mut view: Vec<ViewEntry> = history
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .map(ViewEntry::confirmed)
            .collect();
        view.sort_by_key(|e| e.created_at);
        self.view = view;
    }

    /// Append an optimistic entry for `content`. Returns `None` for content
    /// that is empty after trimming.
    pub fn begin_send(&mut self, content: &str) -> Option<(PendingSend, NewMessage)> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let local_key = self.next_key;
        self.next_key += 1;
        self.view.push(ViewEntry {
            state: EntryState::Pending { local_key },
            sender: self.me.clone(),
            receiver: self.counterpart.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        });

        let new = NewMessage {
            sender: self.me.clone(),
            receiver: self.counterpart.clone(),
            content: content.to_string(),
        };
        Some((PendingSend { local_key }, new))
    }

    /// The store accepted the send and returned `message`.
    pub fn confirm_send(&mut self, pending: PendingSend, message: Message) {
        if self.position_of_id(message.id).is_some() {
            // A realtime echo got here first.
            if let Some(pos) = self.position_of_key(pending.local_key) {
                self.view.remove(pos);
            }
            return;
        }

        let slot = self.position_of_key(pending.local_key).or_else(|| {
            self.view
                .iter()
                .rposition(|e| e.is_pending() && e.content == message.content)
        });
        match slot {
            Some(pos) => self.view[pos] = ViewEntry::confirmed(message),
            None => {
                debug!("No pending entry left for message {}, appending", message.id);
                self.view.push(ViewEntry::confirmed(message));
            }
        }
    }

    /// The store rejected the send. Returns whether the entry was still there.
    pub fn rollback_send(&mut self, pending: PendingSend) -> bool {
        match self.position_of_key(pending.local_key) {
            Some(pos) => {
                self.view.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Settle an in-flight send with the store's answer.
    pub fn complete_send(&mut self, pending: PendingSend, outcome: Result<Message>) -> Result<Message> {
        match outcome {
            Ok(message) => {
                self.confirm_send(pending, message.clone());
                Ok(message)
            }
            Err(e) => {
                self.rollback_send(pending);
                Err(e)
            }
        }
    }

    /// Merge a pushed insert into the view.
    pub fn apply_remote(&mut self, message: Message) -> Applied {
        if !message.is_between(&self.me, &self.counterpart) {
            return Applied::Ignored;
        }
        if self.position_of_id(message.id).is_some() {
            return Applied::Duplicate;
        }

        let pending = self.view.iter().position(|e| {
            e.is_pending()
                && e.sender == message.sender
                && e.receiver == message.receiver
                && e.content == message.content
        });
        match pending {
            Some(pos) => {
                self.view[pos] = ViewEntry::confirmed(message);
                Applied::Confirmed
            }
            None => {
                self.view.push(ViewEntry::confirmed(message));
                Applied::Appended
            }
        }
    }

    /// Display rows for the current view, oldest first. Equal timestamps keep
    /// their view order.
    pub fn render(&self) -> Vec<RenderedRow> {
        let mut entries: Vec<&ViewEntry> = self.view.iter().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
            .into_iter()
            .map(|e| RenderedRow {
                direction: if e.sender == self.me {
                    Direction::Outgoing
                } else {
                    Direction::Incoming
                },
                sender: e.sender.clone(),
                content: e.content.clone(),
                created_at: e.created_at,
                time_label: e.created_at.with_timezone(&Local).format("%H:%M").to_string(),
                pending: e.is_pending(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn msg(id: i64, sender: &str, receiver: &str, content: &str, secs: i64) -> Message {
        Message {
            id,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            created_at: at(secs),
        }
    }

    fn ids(conv: &Conversation) -> Vec<Option<i64>> {
        conv.view().iter().map(ViewEntry::id).collect()
    }

    #[test]
    fn history_is_sorted_by_timestamp() {
        let mut conv = Conversation::new("alice", "bob");
        conv.replace_history(vec![
            msg(2, "bob", "alice", "second", 20),
            msg(1, "alice", "bob", "first", 10),
        ]);
        assert_eq!(ids(&conv), vec![Some(1), Some(2)]);
    }

    #[test]
    fn history_keeps_first_copy_of_each_id() {
        let mut conv = Conversation::new("alice", "bob");
        conv.replace_history(vec![
            msg(1, "alice", "bob", "first", 10),
            msg(2, "bob", "alice", "second", 20),
            msg(1, "alice", "bob", "first again", 10),
        ]);
        assert_eq!(ids(&conv), vec![Some(1), Some(2)]);
        assert_eq!(conv.view()[0].content, "first");
    }

    #[test]
    fn blank_send_is_ignored() {
        let mut conv = Conversation::new("alice", "bob");
        assert!(conv.begin_send("   ").is_none());
        assert!(conv.view().is_empty());
    }

    #[test]
    fn send_is_trimmed_and_pending() {
        let mut conv = Conversation::new("alice", "bob");
        let (_, new) = conv.begin_send("  hi  ").unwrap();
        assert_eq!(new.content, "hi");
        assert_eq!(new.receiver, "bob");
        assert!(conv.view()[0].is_pending());
    }

    #[test]
    fn confirmation_replaces_pending_in_place() {
        let mut conv = Conversation::new("alice", "bob");
        conv.replace_history(vec![msg(1, "bob", "alice", "yo", 10)]);
        let (pending, _) = conv.begin_send("hi").unwrap();
        conv.confirm_send(pending, msg(9, "alice", "bob", "hi", 20));
        assert_eq!(ids(&conv), vec![Some(1), Some(9)]);
    }

    #[test]
    fn realtime_echo_confirms_pending() {
        let mut conv = Conversation::new("alice", "bob");
        let (pending, _) = conv.begin_send("hi").unwrap();

        let applied = conv.apply_remote(msg(7, "alice", "bob", "hi", 5));
        assert_eq!(applied, Applied::Confirmed);
        assert_eq!(ids(&conv), vec![Some(7)]);

        // The store's own answer arrives afterwards.
        conv.confirm_send(pending, msg(7, "alice", "bob", "hi", 5));
        assert_eq!(ids(&conv), vec![Some(7)]);
    }

    #[test]
    fn echo_after_confirmation_is_duplicate() {
        let mut conv = Conversation::new("alice", "bob");
        let (pending, _) = conv.begin_send("hi").unwrap();
        conv.confirm_send(pending, msg(7, "alice", "bob", "hi", 5));
        assert_eq!(conv.apply_remote(msg(7, "alice", "bob", "hi", 5)), Applied::Duplicate);
        assert_eq!(ids(&conv), vec![Some(7)]);
    }

    #[test]
    fn other_pairs_are_ignored() {
        let mut conv = Conversation::new("alice", "bob");
        conv.replace_history(vec![msg(1, "bob", "alice", "yo", 10)]);
        let before = conv.view().to_vec();
        assert_eq!(conv.apply_remote(msg(2, "carol", "dave", "psst", 11)), Applied::Ignored);
        assert_eq!(conv.apply_remote(msg(3, "carol", "alice", "hey", 12)), Applied::Ignored);
        assert_eq!(conv.view(), before.as_slice());
    }

    #[test]
    fn incoming_message_is_appended() {
        let mut conv = Conversation::new("alice", "bob");
        assert_eq!(conv.apply_remote(msg(4, "bob", "alice", "hi", 1)), Applied::Appended);
        assert_eq!(conv.render()[0].direction, Direction::Incoming);
    }

    #[test]
    fn incoming_with_same_text_does_not_confirm_outgoing() {
        let mut conv = Conversation::new("alice", "bob");
        conv.begin_send("hi").unwrap();
        assert_eq!(conv.apply_remote(msg(4, "bob", "alice", "hi", 1)), Applied::Appended);
        assert_eq!(ids(&conv), vec![None, Some(4)]);
    }

    #[test]
    fn failed_send_removes_pending() {
        let mut conv = Conversation::new("alice", "bob");
        let (pending, _) = conv.begin_send("hi").unwrap();
        let result = conv.complete_send(pending, Err(ClientError::Store { status: 500 }));
        assert!(result.is_err());
        assert!(conv.view().is_empty());
    }

    #[test]
    fn two_identical_sends_each_keep_one_entry() {
        let mut conv = Conversation::new("alice", "bob");
        let (first, _) = conv.begin_send("ok").unwrap();
        let (second, _) = conv.begin_send("ok").unwrap();

        // Echo of the second insert lands before either confirmation.
        conv.apply_remote(msg(11, "alice", "bob", "ok", 2));
        conv.confirm_send(first, msg(10, "alice", "bob", "ok", 1));
        conv.confirm_send(second, msg(11, "alice", "bob", "ok", 2));

        let mut got: Vec<_> = ids(&conv);
        got.sort();
        assert_eq!(got, vec![Some(10), Some(11)]);
    }

    #[test]
    fn render_is_stable_and_classified() {
        let mut conv = Conversation::new("alice", "bob");
        conv.replace_history(vec![
            msg(1, "alice", "bob", "a", 10),
            msg(2, "bob", "alice", "b", 10),
            msg(3, "bob", "alice", "c", 5),
        ]);
        conv.apply_remote(msg(4, "bob", "alice", "d", 1));

        let rows = conv.render();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["d", "c", "a", "b"]);
        assert_eq!(rows[2].direction, Direction::Outgoing);
        assert_eq!(rows[3].direction, Direction::Incoming);
        assert_eq!(rows[0].time_label.len(), 5);
        assert_eq!(&rows[0].time_label[2..3], ":");

        // Rendering leaves the view untouched.
        assert_eq!(ids(&conv), vec![Some(3), Some(1), Some(2), Some(4)]);
    }
}
