use tracing::info;

use crate::error::{ClientError, Result};
use crate::session::{Identity, SessionStore};
use crate::store::AuthService;

fn validate<'a>(username: &'a str, password: &str) -> Result<&'a str> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ClientError::Validation("username and password are required"));
    }
    Ok(username)
}

pub async fn register(service: &dyn AuthService, username: &str, password: &str) -> Result<()> {
    let username = validate(username, password)?;
    service.register(username, password).await?;
    info!("Registered {}", username);
    Ok(())
}

/// Log in and persist the resulting identity.
pub async fn login(
    service: &dyn AuthService,
    session: &SessionStore,
    username: &str,
    password: &str,
) -> Result<Identity> {
    let username = validate(username, password)?;
    let identity = service.login(username, password).await?;
    session.save(&identity)?;
    info!("Logged in as {}", identity.username);
    Ok(identity)
}

pub fn logout(session: &SessionStore) -> Result<()> {
    session.clear()?;
    info!("Logged out");
    Ok(())
}
