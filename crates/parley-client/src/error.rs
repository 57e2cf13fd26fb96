use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure or timeout talking to the server.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server rejected request ({status})")]
    Store { status: u16 },

    /// Input rejected locally, before any network call.
    #[error("{0}")]
    Validation(&'static str),

    #[error("not logged in")]
    Unauthenticated,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account already exists")]
    AccountExists,

    #[error("session storage: {0}")]
    Storage(#[from] std::io::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
