use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per direction: (alice, bob) and (bob, alice)
        CREATE TABLE IF NOT EXISTS contacts (
            owner_username    TEXT NOT NULL REFERENCES users(username),
            contact_username  TEXT NOT NULL REFERENCES users(username),
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(owner_username, contact_username)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_username     TEXT NOT NULL REFERENCES users(username),
            receiver_username   TEXT NOT NULL REFERENCES users(username),
            content             TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_username, receiver_username, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
