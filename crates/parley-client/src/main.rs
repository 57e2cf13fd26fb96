use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use parley_client::auth;
use parley_client::config::ClientConfig;
use parley_client::conversation::{Direction, RenderedRow};
use parley_client::directory::ContactDirectory;
use parley_client::http::HttpStore;
use parley_client::messenger::{Messenger, RenderSink};
use parley_client::realtime::GatewayListener;
use parley_client::session::{Identity, SessionStore};
use parley_client::{ClientError, Result};

const HELP: &str = "\
commands:
  /register <user> <password>   create an account
  /login <user> <password>      log in
  /logout                       forget the saved session
  /whoami                       show the logged-in user
  /contacts                     list contacts
  /add <user>                   add a mutual contact
  /open <user>                  open the conversation with a contact
  /close                        close the open conversation
  /help                         show this list
  /quit                         exit
anything else is sent to the open conversation";

struct PrintSink;

impl RenderSink for PrintSink {
    fn render(&mut self, counterpart: &str, rows: &[RenderedRow]) {
        println!("--- {} ---", counterpart);
        for row in rows {
            let marker = match row.direction {
                Direction::Outgoing => ">",
                Direction::Incoming => "<",
            };
            let state = if row.pending { " (sending)" } else { "" };
            println!("[{}] {} {}: {}{}", row.time_label, marker, row.sender, row.content, state);
        }
    }
}

/// Everything that needs a logged-in user.
struct Online {
    messenger: Messenger,
    contacts: ContactDirectory,
}

impl Online {
    async fn connect(config: &ClientConfig, identity: Identity) -> Result<Self> {
        let token = identity.token.clone().ok_or(ClientError::Unauthenticated)?;
        let http = Arc::new(HttpStore::new(config)?.with_token(token.clone()));
        let realtime = Arc::new(GatewayListener::new(config.gateway_url.clone(), token));

        let mut contacts = ContactDirectory::new(http.clone(), identity.username.clone());
        match contacts.load().await {
            Ok(_) => {}
            Err(ClientError::Unauthenticated) => return Err(ClientError::Unauthenticated),
            Err(e) => warn!("Contacts unavailable: {}", e),
        }

        let messenger = Messenger::new(identity, http, realtime).with_sink(PrintSink);
        Ok(Self { messenger, contacts })
    }
}

enum Flow {
    Continue,
    Quit,
}

struct App {
    config: ClientConfig,
    session: SessionStore,
    auth: HttpStore,
    online: Option<Online>,
}

impl App {
    async fn go_online(&mut self, identity: Identity) -> Result<()> {
        let online = Online::connect(&self.config, identity).await?;
        println!(
            "logged in as {} ({} contacts)",
            online.messenger.identity().username,
            online.contacts.list().len()
        );
        self.online = Some(online);
        Ok(())
    }

    fn online(&mut self) -> Result<&mut Online> {
        self.online.as_mut().ok_or(ClientError::Unauthenticated)
    }

    async fn handle(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (None, _, _) => {}
            (Some("/quit"), _, _) => return Ok(Flow::Quit),
            (Some("/help"), _, _) => println!("{}", HELP),
            (Some("/register"), Some(user), Some(password)) => {
                auth::register(&self.auth, user, password).await?;
                println!("registered {}, now /login", user.trim());
            }
            (Some("/login"), Some(user), Some(password)) => {
                self.online = None;
                let identity = auth::login(&self.auth, &self.session, user, password).await?;
                self.go_online(identity).await?;
            }
            (Some("/logout"), _, _) => {
                self.online = None;
                auth::logout(&self.session)?;
                println!("logged out");
            }
            (Some("/whoami"), _, _) => {
                let online = self.online()?;
                match online.messenger.active_counterpart() {
                    Some(other) => println!("{} (talking to {})", online.messenger.identity().username, other),
                    None => println!("{}", online.messenger.identity().username),
                }
            }
            (Some("/contacts"), _, _) => {
                let contacts = self.online()?.contacts.load().await?;
                if contacts.is_empty() {
                    println!("no contacts yet, /add <user>");
                }
                for contact in contacts {
                    println!("  {}", contact);
                }
            }
            (Some("/add"), Some(contact), _) => {
                let online = self.online()?;
                if online.contacts.add(contact).await? {
                    println!("added {}", contact.trim());
                } else {
                    println!("{} is already a contact", contact.trim());
                }
            }
            (Some("/open"), Some(contact), _) => {
                self.online()?.messenger.open_conversation(contact).await?;
            }
            (Some("/close"), _, _) => self.online()?.messenger.close_conversation(),
            (Some(command), _, _) if command.starts_with('/') => {
                println!("unknown or incomplete command {}\n{}", command, HELP);
            }
            _ => {
                let messenger = &mut self.online()?.messenger;
                if messenger.active_counterpart().is_none() {
                    println!("open a conversation first: /open <user>");
                } else {
                    messenger.send(line).await?;
                }
            }
        }
        Ok(Flow::Continue)
    }
}

fn report(err: &ClientError) {
    match err {
        ClientError::Unauthenticated => println!("not logged in: /login <user> <password>"),
        other => println!("error: {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let mut app = App {
        session: SessionStore::new(&config.session_dir),
        auth: HttpStore::new(&config)?,
        config,
        online: None,
    };

    match app.session.current_identity() {
        Some(identity) => {
            if let Err(e) = app.go_online(identity).await {
                report(&e);
            }
        }
        None => println!("not logged in: /register or /login (see /help)"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match app.online.as_mut() {
            Some(online) => tokio::select! {
                line = lines.next_line() => line?,
                _ = online.messenger.next_realtime() => continue,
            },
            None => lines.next_line().await?,
        };
        let Some(line) = line else { break };

        match app.handle(line.trim()).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => report(&e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_lists_every_command() {
        for command in [
            "/register", "/login", "/logout", "/whoami", "/contacts", "/add", "/open", "/close",
            "/help", "/quit",
        ] {
            assert!(HELP.contains(command), "{} missing from help", command);
        }
    }
}
