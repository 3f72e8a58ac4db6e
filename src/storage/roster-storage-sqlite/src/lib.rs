//! # Roster Storage - SQLite Backend
//!
//! SQLite implementation of the group catalog, user records and the
//! user/group membership relation. Every membership change is appended to
//! an audit table together with the acting component.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;
use tracing::{debug, info};

use roster_storage::{Group, GroupId, GroupStore, StorageError, UserRecord, UserStore};

/// SQL schema for the directory tables.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email        TEXT,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_groups (
    user_id    TEXT NOT NULL,
    group_id   INTEGER NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, group_id)
);

CREATE TABLE IF NOT EXISTS membership_history (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   TEXT NOT NULL,
    group_id  INTEGER NOT NULL,
    operation TEXT NOT NULL,
    actor     TEXT,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_membership_history_user ON membership_history (user_id)
"#;

/// SQLite storage backend.
///
/// The database lives at `{base_path}/{name}.db`.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    actor: Option<String>,
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Opens or creates a SQLite database.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory where the database file is stored
    /// * `name` - Database name (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is invalid
    /// - Directory cannot be created
    /// - Database connection or migration fails
    pub async fn open(base_path: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        Self::validate_name(name)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{name}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(name = %name, path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let backend = Self {
            pool,
            actor: None,
            db_path,
        };

        backend.migrate().await?;

        info!(name = %name, "SQLite backend ready");

        Ok(backend)
    }

    /// Sets the actor recorded in the membership history.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Path of the underlying database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Only allows: lowercase letters, digits, underscore, hyphen.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput("database name cannot be empty".into()));
        }

        if name.len() > 64 {
            return Err(StorageError::InvalidInput("database name too long".into()));
        }

        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "database name must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement.trim())
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        debug!("Migrations complete");

        Ok(())
    }

    /// Returns the current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    async fn group_exists(&self, group_id: GroupId) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM groups WHERE id = ?")
            .bind(group_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn record_history(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        group_id: GroupId,
        operation: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO membership_history (user_id, group_id, operation, actor, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(group_id.0)
        .bind(operation)
        .bind(self.actor.as_deref())
        .bind(Self::now())
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))
    }

    async fn commit(tx: Transaction<'_, Sqlite>) -> Result<(), StorageError> {
        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl GroupStore for SqliteBackend {
    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Group::new(id, name))
            .collect())
    }

    async fn create_group(&self, name: &str) -> Result<Group, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("group name cannot be empty".into()));
        }

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if existing.is_some() {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        let result = sqlx::query("INSERT INTO groups (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Self::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(Group::new(result.last_insert_rowid(), name))
    }

    async fn current_group_ids(&self, user_id: &str) -> Result<BTreeSet<GroupId>, StorageError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT group_id FROM user_groups WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| GroupId(id)).collect())
    }

    async fn relate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
        if !self.group_exists(group_id).await? {
            return Err(StorageError::NotFound(format!("group {group_id}")));
        }

        // Membership row and history entry land together or not at all
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(group_id.0)
        .bind(Self::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if result.rows_affected() > 0 {
            self.record_history(&mut tx, user_id, group_id, "relate").await?;
        }

        Self::commit(tx).await
    }

    async fn unrelate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        let result = sqlx::query("DELETE FROM user_groups WHERE user_id = ? AND group_id = ?")
            .bind(user_id)
            .bind(group_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if result.rows_affected() > 0 {
            self.record_history(&mut tx, user_id, group_id, "unrelate").await?;
        }

        Self::commit(tx).await
    }
}

#[async_trait]
impl UserStore for SqliteBackend {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let now = Self::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(user.email.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, display_name, email FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(|(id, display_name, email)| UserRecord {
            id,
            display_name,
            email,
        }))
    }
}
