//! Token store for connected accounts
//!
//! Accounts live in a single SQLite table keyed by id, with a uniqueness
//! constraint on `(user_id, platform, external_account_id)`. Token columns
//! only ever hold ciphertext produced by [`crate::cipher::SecretCipher`].

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{DbError, Result};
use crate::types::{ConnectedAccount, Platform};

const ACCOUNT_COLUMNS: &str = "id, user_id, platform, external_account_id, external_account_name, \
     access_token_cipher, refresh_token_cipher, expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// In-memory database on a single connection, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert an account, or refresh the existing row for the same
    /// `(user_id, platform, external_account_id)`
    ///
    /// On conflict the existing row keeps its `id` and `created_at`; the
    /// display name, token ciphertexts, expiry and `updated_at` are replaced.
    /// Returns the row as stored.
    pub async fn upsert_account(&self, account: &ConnectedAccount) -> Result<ConnectedAccount> {
        let sql = format!(
            r#"
            INSERT INTO connected_accounts ({ACCOUNT_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, platform, external_account_id) DO UPDATE SET
                external_account_name = excluded.external_account_name,
                access_token_cipher = excluded.access_token_cipher,
                refresh_token_cipher = excluded.refresh_token_cipher,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&account.id)
            .bind(&account.user_id)
            .bind(account.platform.as_str())
            .bind(&account.external_account_id)
            .bind(&account.external_account_name)
            .bind(&account.access_token_cipher)
            .bind(&account.refresh_token_cipher)
            .bind(account.expires_at.map(|t| t.timestamp()))
            .bind(account.created_at.timestamp())
            .bind(account.updated_at.timestamp())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row_to_account(&row)
    }

    /// The account a user has connected on a platform
    ///
    /// When several external accounts are connected, the most recently
    /// updated one wins, then the most recently inserted.
    pub async fn find_account(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<ConnectedAccount>> {
        let sql = format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM connected_accounts
            WHERE user_id = ? AND platform = ?
            ORDER BY updated_at DESC, created_at DESC, rowid DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<ConnectedAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE id = ?");

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// All accounts of a user, ordered by platform then most recent first
    pub async fn list_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>> {
        let sql = format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM connected_accounts
            WHERE user_id = ?
            ORDER BY platform ASC, updated_at DESC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_account).collect()
    }

    /// Replace the tokens of an account after a refresh
    ///
    /// A `None` refresh ciphertext keeps the stored one, since most providers
    /// only rotate refresh tokens occasionally. Returns `false` if the account
    /// no longer exists.
    pub async fn update_tokens(
        &self,
        id: &str,
        access_token_cipher: &str,
        refresh_token_cipher: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE connected_accounts SET
                access_token_cipher = ?,
                refresh_token_cipher = COALESCE(?, refresh_token_cipher),
                expires_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token_cipher)
        .bind(refresh_token_cipher)
        .bind(expires_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an account; returns whether a row was deleted
    pub async fn delete_account(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM connected_accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every account a user holds on one platform
    pub async fn delete_accounts_for(&self, user_id: &str, platform: Platform) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM connected_accounts WHERE user_id = ? AND platform = ?")
                .bind(user_id)
                .bind(platform.as_str())
                .execute(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }
}

fn row_to_account(row: &SqliteRow) -> Result<ConnectedAccount> {
    let platform: String = row.try_get("platform").map_err(DbError::SqlxError)?;
    let platform = platform.parse::<Platform>().map_err(|_| corrupt(format!(
        "unknown platform '{}'",
        platform
    )))?;

    let expires_at: Option<i64> = row.try_get("expires_at").map_err(DbError::SqlxError)?;
    let created_at: i64 = row.try_get("created_at").map_err(DbError::SqlxError)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(DbError::SqlxError)?;

    Ok(ConnectedAccount {
        id: row.try_get("id").map_err(DbError::SqlxError)?,
        user_id: row.try_get("user_id").map_err(DbError::SqlxError)?,
        platform,
        external_account_id: row
            .try_get("external_account_id")
            .map_err(DbError::SqlxError)?,
        external_account_name: row
            .try_get("external_account_name")
            .map_err(DbError::SqlxError)?,
        access_token_cipher: row
            .try_get("access_token_cipher")
            .map_err(DbError::SqlxError)?,
        refresh_token_cipher: row
            .try_get("refresh_token_cipher")
            .map_err(DbError::SqlxError)?,
        expires_at: expires_at.map(timestamp).transpose()?,
        created_at: timestamp(created_at)?,
        updated_at: timestamp(updated_at)?,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| corrupt(format!("timestamp {} out of range", secs)))
}

fn corrupt(reason: String) -> crate::error::CrosscastError {
    DbError::CorruptRow {
        table: "connected_accounts".to_string(),
        reason,
    }
    .into()
}
