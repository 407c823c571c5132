//! Database module: models, schema and SQLite storage for users and sessions.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the credential store and session table operations

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbSession, DbUser};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, UserStorage, connect};
