use std::sync::Arc;

use axum::response::Response;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;

use crate::auth::{AppState, AppStateInner, create_token};

pub fn test_state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        dispatcher: Dispatcher::new(),
    })
}

/// Insert users directly, bypassing password hashing.
pub fn seed_users(state: &AppState, names: &[&str]) {
    for name in names {
        state.db.create_user(&Uuid::new_v4().to_string(), name, "unused").unwrap();
    }
}

pub fn token_for(state: &AppState, username: &str) -> String {
    create_token(&state.jwt_secret, Uuid::new_v4(), username).unwrap()
}

pub async fn body_json<T: DeserializeOwned>(resp: Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
