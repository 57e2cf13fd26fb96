/// Database row types, one per SQLite table.
/// Distinct from parley-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub content: String,
    /// RFC 3339 with millisecond precision, UTC ("...Z").
    pub created_at: String,
}
