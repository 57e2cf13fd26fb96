use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use parley_types::api::{AddContactRequest, Claims, ContactsResponse};

use crate::auth::AppState;

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let owner = claims.username;
    let contacts = tokio::task::spawn_blocking(move || db.db.list_contacts(&owner))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ContactsResponse { contacts }))
}

/// Adds the edge in both directions. Re-adding an existing contact is
/// accepted and leaves the stored rows unchanged.
pub async fn add_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddContactRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let contact = req.contact.trim().to_string();
    if contact.is_empty() || contact == claims.username {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.clone();
    let owner = claims.username.clone();
    let contacts = tokio::task::spawn_blocking(move || {
        let exists = db
            .db
            .get_user_by_username(&contact)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some();
        if !exists {
            return Err(StatusCode::NOT_FOUND);
        }

        let inserted = db.db.add_contact_pair(&owner, &contact).map_err(|e| {
            error!("add contact {} -> {}: {}", owner, contact, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        if inserted > 0 {
            info!("{} added contact {}", owner, contact);
        }

        db.db
            .list_contacts(&owner)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })??;

    Ok(Json(ContactsResponse { contacts }))
}
