use crate::credentials::CredentialMaterial;
use crate::db::models::{DbSession, DbUser, NewUserExtra};
use crate::db::schema::SQLITE_INIT;
use crate::error::AppError;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

const USER_COLUMNS: &str = "id, identifier, credential, credential_scheme, federated_id, \
                            display_name, secret_text, created_at";

/// Open (creating if needed) the SQLite database behind `database_url`.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_opts)
        .await?;
    Ok(pool)
}

/// Credential store and session table, shared through the connection pool.
///
/// Uniqueness of identifiers, provider subjects and session tokens is
/// enforced by the schema, never by in-process locks.
#[derive(Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), AppError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a locally registered user.
    ///
    /// Fails with [`AppError::DuplicateIdentifier`] when the identifier exists.
    pub async fn create(
        &self,
        identifier: &str,
        material: CredentialMaterial,
        extra: NewUserExtra,
    ) -> Result<DbUser, AppError> {
        let sql = format!(
            "INSERT INTO users (identifier, credential, credential_scheme, display_name, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );
        let res = sqlx::query_as::<_, DbUser>(&sql)
            .bind(identifier)
            .bind(material.value)
            .bind(material.scheme)
            .bind(extra.display_name)
            .bind(Utc::now().to_rfc3339())
            .fetch_one(&self.pool)
            .await;
        match res {
            Ok(user) => {
                info!(user_id = user.id, identifier, "user created");
                Ok(user)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::DuplicateIdentifier)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<DbUser>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE identifier = ?");
        let user = sqlx::query_as::<_, DbUser>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DbUser>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Resolve the local user for a provider subject, creating it if absent.
    ///
    /// Insert-or-ignore on the unique `federated_id` followed by a lookup, so
    /// concurrent callers with the same subject all observe the same row.
    pub async fn find_or_create_by_federated_id(
        &self,
        federated_id: &str,
        extra: NewUserExtra,
    ) -> Result<DbUser, AppError> {
        let inserted = sqlx::query(
            "INSERT INTO users (federated_id, display_name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(federated_id) DO NOTHING",
        )
        .bind(federated_id)
        .bind(extra.display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE federated_id = ?");
        let user = sqlx::query_as::<_, DbUser>(&sql)
            .bind(federated_id)
            .fetch_one(&self.pool)
            .await?;
        if inserted == 1 {
            info!(user_id = user.id, "user created from provider login");
        } else {
            debug!(user_id = user.id, "provider login matched existing user");
        }
        Ok(user)
    }

    /// Store the user's secret text. Returns false when no such user exists.
    pub async fn update_secret_text(&self, user_id: i64, text: &str) -> Result<bool, AppError> {
        let affected = sqlx::query("UPDATE users SET secret_text = ? WHERE id = ?")
            .bind(text)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }

    /// All non-null secret texts, oldest account first.
    pub async fn list_secrets(&self) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT secret_text FROM users WHERE secret_text IS NOT NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn count_by_identifier(&self, identifier: &str) -> Result<i64, AppError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE identifier = ?")
            .bind(identifier)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    pub async fn count_by_federated_id(&self, federated_id: &str) -> Result<i64, AppError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE federated_id = ?")
            .bind(federated_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    pub async fn insert_session(&self, token_hash: &str, user_id: i64) -> Result<(), AppError> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(user_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn lookup_session(&self, token_hash: &str) -> Result<Option<DbSession>, AppError> {
        let session = sqlx::query_as::<_, DbSession>(
            "SELECT token_hash, user_id, created_at FROM sessions WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Delete a session row. Deleting an unknown hash is not an error.
    pub async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
