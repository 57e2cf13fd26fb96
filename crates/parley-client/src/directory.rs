use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::store::ContactStore;

/// Cached contact list of one user.
pub struct ContactDirectory {
    store: Arc<dyn ContactStore>,
    owner: String,
    contacts: Vec<String>,
}

impl ContactDirectory {
    pub fn new(store: Arc<dyn ContactStore>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
            contacts: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Refresh from the store. On failure the cached list is kept.
    pub async fn load(&mut self) -> Result<&[String]> {
        match self.store.list_contacts(&self.owner).await {
            Ok(mut contacts) => {
                contacts.sort();
                self.contacts = contacts;
                Ok(&self.contacts)
            }
            Err(e) => {
                warn!("Failed to load contacts for {}: {}", self.owner, e);
                Err(e)
            }
        }
    }

    pub fn list(&self) -> &[String] {
        &self.contacts
    }

    pub fn contains(&self, contact: &str) -> bool {
        self.contacts.iter().any(|c| c == contact)
    }

    /// Add a mutual contact. Returns `false` when it is already listed.
    pub async fn add(&mut self, contact: &str) -> Result<bool> {
        let contact = contact.trim();
        if contact.is_empty() {
            return Err(ClientError::Validation("contact name is empty"));
        }
        if contact == self.owner {
            return Err(ClientError::Validation("cannot add yourself as a contact"));
        }
        if self.contains(contact) {
            return Ok(false);
        }

        self.store.add_contact(&self.owner, contact).await?;
        info!("{} added contact {}", self.owner, contact);
        self.load().await?;
        Ok(true)
    }
}
