use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use parley_types::api::{
    AddContactRequest, ContactsResponse, LoginRequest, LoginResponse, RegisterRequest,
    SendMessageRequest,
};
use parley_types::models::Message;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Identity;
use crate::store::{AuthService, ContactStore, MessageStore, NewMessage};

/// REST adapter for parley-api.
///
/// Authenticated calls act as the user the bearer token was issued to; the
/// `me` / `owner` / `sender` arguments of the store traits are not sent.
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthenticated)?;
        Ok(builder.bearer_auth(token))
    }
}

/// Map non-success statuses onto the client error taxonomy.
fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    debug!("{} -> {}", resp.url(), status);
    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
        _ => ClientError::Store {
            status: status.as_u16(),
        },
    })
}

/// `{base}/conversations/{counterpart}/messages`, with the counterpart
/// encoded as a single path segment.
fn conversation_url(base_url: &str, counterpart: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ClientError::Transport(format!("bad API URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Transport(format!("API URL {} cannot carry a path", base_url)))?
        .pop_if_empty()
        .extend(["conversations", counterpart, "messages"]);
    Ok(url)
}

#[async_trait]
impl MessageStore for HttpStore {
    async fn fetch_conversation(&self, _me: &str, other: &str) -> Result<Vec<Message>> {
        let req = self.authed(self.client.get(conversation_url(&self.base_url, other)?))?;
        let resp = check(req.send().await?)?;
        Ok(resp.json().await?)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let body = SendMessageRequest {
            content: message.content.clone(),
        };
        let req = self.authed(self.client.post(conversation_url(&self.base_url, &message.receiver)?))?;
        let resp = check(req.json(&body).send().await?)?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ContactStore for HttpStore {
    async fn list_contacts(&self, _owner: &str) -> Result<Vec<String>> {
        let req = self.authed(self.client.get(self.url("/contacts")))?;
        let resp = check(req.send().await?)?;
        Ok(resp.json::<ContactsResponse>().await?.contacts)
    }

    async fn add_contact(&self, _owner: &str, contact: &str) -> Result<()> {
        let body = AddContactRequest {
            contact: contact.to_string(),
        };
        let req = self.authed(self.client.post(self.url("/contacts")))?;
        check(req.json(&body).send().await?)?;
        Ok(())
    }
}

#[async_trait]
impl AuthService for HttpStore {
    async fn register(&self, username: &str, password: &str) -> Result<()> {
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.client.post(self.url("/auth/register")).json(&body).send().await?;
        match resp.status() {
            StatusCode::CONFLICT => Err(ClientError::AccountExists),
            _ => check(resp).map(|_| ()),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.client.post(self.url("/auth/login")).json(&body).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::InvalidCredentials);
        }
        let login: LoginResponse = check(resp)?.json().await?;
        Ok(Identity {
            username: login.username,
            user_id: Some(login.user_id),
            token: Some(login.token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig {
            api_url: "http://127.0.0.1:3000".into(),
            gateway_url: "ws://127.0.0.1:3000/gateway".into(),
            session_dir: ".parley".into(),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn paths_are_encoded() {
        let url = |base: &str, who: &str| conversation_url(base, who).unwrap().to_string();
        assert_eq!(url("http://127.0.0.1:3000", "bob"), "http://127.0.0.1:3000/conversations/bob/messages");
        assert_eq!(
            url("http://127.0.0.1:3000", "a b/c"),
            "http://127.0.0.1:3000/conversations/a%20b%2Fc/messages"
        );
        assert_eq!(url("https://chat.example.com/api", "bob"), "https://chat.example.com/api/conversations/bob/messages");
    }

    #[tokio::test]
    async fn authenticated_calls_need_a_token() {
        let store = HttpStore::new(&config()).unwrap();
        let err = store.list_contacts("alice").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }
}
