use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use parley_types::events::{GatewayCommand, GatewayEvent};
use parley_types::models::Message;

use crate::error::{ClientError, Result};
use crate::store::{RealtimeSource, Subscription};

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime listener backed by the server's WebSocket gateway. Each
/// subscription opens its own connection and forwards every message insert
/// the gateway delivers; filtering to the open conversation is left to the
/// reconciliation engine.
pub struct GatewayListener {
    url: String,
    token: String,
}

impl GatewayListener {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl RealtimeSource for GatewayListener {
    async fn subscribe(&self, me: &str, counterpart: &str) -> Result<Subscription> {
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        let identify = serde_json::to_string(&GatewayCommand::Identify {
            token: self.token.clone(),
        })?;
        sink.send(WsMessage::Text(identify.into())).await?;

        let ready = tokio::time::timeout(READY_TIMEOUT, async {
            while let Some(frame) = stream.next().await {
                if let WsMessage::Text(text) = frame? {
                    if let Ok(GatewayEvent::Ready { username, .. }) = serde_json::from_str(text.as_str()) {
                        return Ok(Some(username));
                    }
                }
            }
            Ok::<_, ClientError>(None)
        })
        .await
        .map_err(|_| ClientError::Transport("gateway did not answer Identify".into()))??;

        let Some(username) = ready else {
            return Err(ClientError::Unauthenticated);
        };
        info!("Realtime subscribed as {} for conversation with {}", username, counterpart);

        let (tx, rx) = mpsc::unbounded_channel();
        let label = format!("{}:{}", me, counterpart);
        let task = tokio::spawn(async move {
            // Keep the sink alive so the socket is not half-closed.
            let _sink = sink;
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Realtime {} dropped: {}", label, e);
                        break;
                    }
                };
                match parse_insert(text.as_str()) {
                    Some(message) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    None => debug!("Realtime {} ignored frame", label),
                }
            }
            debug!("Realtime {} closed", label);
        });

        Ok(Subscription::with_task(rx, task.abort_handle()))
    }
}

fn parse_insert(text: &str) -> Option<Message> {
    match serde_json::from_str::<GatewayEvent>(text).ok()? {
        GatewayEvent::MessageInsert(message) => Some(message),
        GatewayEvent::Ready { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_frames_only() {
        let frame = r#"{"type":"MessageInsert","data":{"id":7,"sender":"alice","receiver":"bob","content":"hi","created_at":"2026-01-01T10:00:00.000Z"}}"#;
        let message = parse_insert(frame).unwrap();
        assert_eq!(message.id, 7);
        assert_eq!(message.content, "hi");

        let ready = r#"{"type":"Ready","data":{"user_id":"00000000-0000-0000-0000-000000000001","username":"alice"}}"#;
        assert!(parse_insert(ready).is_none());
        assert!(parse_insert("garbage").is_none());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let listener = GatewayListener::new("ws://127.0.0.1:1/gateway", "tok");
        let err = listener.subscribe("alice", "bob").await.err().unwrap();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
