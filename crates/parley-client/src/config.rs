use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub session_dir: PathBuf,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = get("PARLEY_API_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3000".into())
            .trim_end_matches('/')
            .to_string();
        let gateway_url = match get("PARLEY_GATEWAY_URL") {
            Some(url) => url,
            None => gateway_url_for(&api_url)?,
        };
        let session_dir = get("PARLEY_SESSION_DIR").unwrap_or_else(|| ".parley".into()).into();
        let timeout_secs: u64 = get("PARLEY_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".into())
            .parse()?;

        Ok(Self {
            api_url,
            gateway_url,
            session_dir,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// `http://host:port` -> `ws://host:port/gateway` (and https -> wss).
fn gateway_url_for(api_url: &str) -> anyhow::Result<String> {
    let ws_base = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        anyhow::bail!("PARLEY_API_URL must start with http:// or https://, got {}", api_url);
    };
    Ok(format!("{}/gateway", ws_base))
}
