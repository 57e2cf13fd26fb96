use std::sync::Arc;

use tracing::{info, warn};

use parley_types::models::Message;

use crate::conversation::{Applied, Conversation, RenderedRow};
use crate::error::{ClientError, Result};
use crate::session::Identity;
use crate::store::{MessageStore, RealtimeSource};

/// Receives the full row list every time the open conversation's view changes.
pub trait RenderSink: Send {
    fn render(&mut self, counterpart: &str, rows: &[RenderedRow]);
}

pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _counterpart: &str, _rows: &[RenderedRow]) {}
}

/// Drives at most one open [`Conversation`] for the logged-in user.
///
/// All mutation goes through `&mut self`, so a view change and its re-render
/// never interleave with another handler.
pub struct Messenger {
    identity: Identity,
    store: Arc<dyn MessageStore>,
    realtime: Arc<dyn RealtimeSource>,
    sink: Box<dyn RenderSink>,
    active: Option<Conversation>,
}

impl Messenger {
    pub fn new(identity: Identity, store: Arc<dyn MessageStore>, realtime: Arc<dyn RealtimeSource>) -> Self {
        Self {
            identity,
            store,
            realtime,
            sink: Box::new(NullSink),
            active: None,
        }
    }

    pub fn with_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn active_counterpart(&self) -> Option<&str> {
        self.active.as_ref().map(Conversation::counterpart)
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    /// Switch to the conversation with `counterpart`.
    ///
    /// The previous conversation and its realtime feed are released first.
    /// The feed for the new pair is established before history is fetched,
    /// and inserts that arrive during the fetch are merged afterwards.
    pub async fn open_conversation(&mut self, counterpart: &str) -> Result<()> {
        self.active = None;

        let counterpart = counterpart.trim();
        if counterpart.is_empty() {
            return Err(ClientError::Validation("counterpart is empty"));
        }
        let me = self.identity.username.clone();
        let mut conv = Conversation::new(me.as_str(), counterpart);

        match self.realtime.subscribe(&me, counterpart).await {
            Ok(subscription) => conv.set_subscription(subscription),
            Err(e) => warn!("Realtime unavailable for {}: {}, continuing without push", counterpart, e),
        }

        let fetched = self.store.fetch_conversation(&me, counterpart).await;
        let result = match fetched {
            Ok(history) => {
                conv.replace_history(history);
                let mut buffered = 0;
                while let Some(message) = conv.subscription_mut().and_then(|s| s.try_recv()) {
                    if conv.apply_remote(message).changed_view() {
                        buffered += 1;
                    }
                }
                info!(
                    "Opened conversation with {} ({} messages, {} merged from realtime)",
                    counterpart,
                    conv.view().len(),
                    buffered
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to fetch history with {}: {}", counterpart, e);
                Err(e)
            }
        };

        self.active = Some(conv);
        self.render();
        result
    }

    pub fn close_conversation(&mut self) {
        if let Some(conv) = self.active.take() {
            info!("Closed conversation with {}", conv.counterpart());
        }
    }

    /// Send `content` to the open conversation.
    ///
    /// Returns `Ok(None)` when there is nothing to do (no open conversation
    /// or blank content). On failure the optimistic entry is removed again.
    pub async fn send(&mut self, content: &str) -> Result<Option<Message>> {
        let Some(conv) = self.active.as_mut() else {
            return Ok(None);
        };
        let Some((pending, new)) = conv.begin_send(content) else {
            return Ok(None);
        };
        self.render();

        let outcome = self.store.insert_message(&new).await;
        if let Err(e) = &outcome {
            warn!("Send to {} failed: {}", new.receiver, e);
        }

        let Some(conv) = self.active.as_mut() else {
            return outcome.map(Some);
        };
        let result = conv.complete_send(pending, outcome);
        self.render();
        result.map(Some)
    }

    /// Merge one pushed insert into the open conversation.
    pub fn on_realtime_insert(&mut self, message: Message) -> Applied {
        let Some(conv) = self.active.as_mut() else {
            return Applied::Ignored;
        };
        let applied = conv.apply_remote(message);
        if applied.changed_view() {
            self.render();
        }
        applied
    }

    /// Apply every insert already buffered by the realtime feed. Returns the
    /// number that changed the view.
    pub fn poll_realtime(&mut self) -> usize {
        let mut changed = 0;
        while let Some(message) = self
            .active
            .as_mut()
            .and_then(Conversation::subscription_mut)
            .and_then(|s| s.try_recv())
        {
            if self.on_realtime_insert(message).changed_view() {
                changed += 1;
            }
        }
        changed
    }

    /// Wait for the next realtime insert and apply it. Never resolves while
    /// no feed is attached.
    pub async fn next_realtime(&mut self) -> Applied {
        let received = match self.active.as_mut().and_then(Conversation::subscription_mut) {
            Some(subscription) => subscription.recv().await,
            None => std::future::pending().await,
        };
        match received {
            Some(message) => self.on_realtime_insert(message),
            None => {
                warn!("Realtime feed closed");
                if let Some(conv) = self.active.as_mut() {
                    conv.clear_subscription();
                }
                Applied::Ignored
            }
        }
    }

    /// Push the current rows of the open conversation to the sink.
    pub fn render(&mut self) {
        if let Some(conv) = &self.active {
            let rows = conv.render();
            self.sink.render(conv.counterpart(), &rows);
        }
    }
}
