use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, error, warn};

use parley_db::models::MessageRow;
use parley_types::api::{Claims, MAX_CONTENT_CHARS, SendMessageRequest};
use parley_types::events::GatewayEvent;
use parley_types::models::Message;

use crate::auth::AppState;

/// Insert a message from the caller to `counterpart` and announce it on the gateway.
pub async fn send_message(
    State(state): State<AppState>,
    Path(counterpart): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let sender = claims.username.clone();
    let row = tokio::task::spawn_blocking(move || {
        let known = db
            .db
            .get_user_by_username(&counterpart)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some();
        if !known {
            return Err(StatusCode::NOT_FOUND);
        }

        db.db
            .insert_message(&sender, &counterpart, &content)
            .map_err(|e| {
                error!("insert message {} -> {}: {}", sender, counterpart, e);
                StatusCode::INTERNAL_SERVER_ERROR
            })
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    let message = message_from_row(row).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    debug!("message {} {} -> {}", message.id, message.sender, message.receiver);

    state.dispatcher.broadcast(GatewayEvent::MessageInsert(message.clone()));

    Ok((StatusCode::CREATED, Json(message)))
}

/// Full history between the caller and `counterpart`, oldest first.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(counterpart): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let me = claims.username;
    let rows = tokio::task::spawn_blocking(move || db.db.get_conversation(&me, &counterpart))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<Message> = rows.into_iter().filter_map(message_from_row).collect();
    Ok(Json(messages))
}

/// `None` (logged) for a row whose timestamp does not parse; such a row has
/// no place in the ordering.
fn message_from_row(row: MessageRow) -> Option<Message> {
    let created_at = match row.created_at.parse::<chrono::DateTime<chrono::Utc>>() {
        Ok(created_at) => created_at,
        Err(e) => {
            warn!("Skipping message {} with corrupt created_at '{}': {}", row.id, row.created_at, e);
            return None;
        }
    };

    Some(Message {
        id: row.id,
        sender: row.sender_username,
        receiver: row.receiver_username,
        content: row.content,
        created_at,
    })
}
