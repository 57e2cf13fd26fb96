use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Contacts --

    /// Contact usernames for `owner`, ascending.
    pub fn list_contacts(&self, owner: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT contact_username FROM contacts
                 WHERE owner_username = ?1
                 ORDER BY contact_username ASC",
            )?;
            let rows = stmt
                .query_map([owner], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert both directed rows of the (owner, contact) edge in one
    /// transaction. Rows that already exist are left alone.
    /// Returns the number of rows actually inserted (0, 1 or 2).
    pub fn add_contact_pair(&self, owner: &str, contact: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut inserted = 0;
            for (a, b) in [(owner, contact), (contact, owner)] {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO contacts (owner_username, contact_username) VALUES (?1, ?2)",
                    (a, b),
                )?;
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    // -- Messages --

    /// Insert a message stamped with the current time and return the stored row.
    pub fn insert_message(&self, sender: &str, receiver: &str, content: &str) -> Result<MessageRow> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_username, receiver_username, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (sender, receiver, content, &created_at),
            )?;
            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                sender_username: sender.to_string(),
                receiver_username: receiver.to_string(),
                content: content.to_string(),
                created_at,
            })
        })
    }

    /// Every message exchanged between `a` and `b`, oldest first.
    /// Equal timestamps keep insertion order.
    pub fn get_conversation(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_conversation(conn: &Connection, a: &str, b: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_username, receiver_username, content, created_at
         FROM messages
         WHERE (sender_username = ?1 AND receiver_username = ?2)
            OR (sender_username = ?2 AND receiver_username = ?1)
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt
        .query_map((a, b), |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender_username: row.get(1)?,
                receiver_username: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
