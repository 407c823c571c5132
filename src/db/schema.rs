//! SQL DDL for initializing the user and session storage.

/// SQLite schema with:
/// - `users.identifier` UNIQUE but NULL for provider-only accounts
///   (SQLite allows any number of NULLs under a UNIQUE constraint)
/// - `users.federated_id` UNIQUE, the provider's stable subject id
/// - `sessions.token_hash` hex SHA-256 of the opaque token; raw tokens are never stored
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NULL UNIQUE,
    credential TEXT NULL,
    credential_scheme TEXT NULL,
    federated_id TEXT NULL UNIQUE,
    display_name TEXT NULL,
    secret_text TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
"#;
