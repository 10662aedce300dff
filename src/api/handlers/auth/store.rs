//! Credential store: account records and per-account atomic mutations.
//!
//! The backend is selected once at startup: Postgres when a DSN is
//! configured, otherwise an in-memory map so the service stays usable in
//! development without a database. Action tokens are stored as digests, the
//! raw values only ever travel inside email links.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Landing page a session of this role is redirected to after login.
    #[must_use]
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Self::User => "/user/dashboard",
            Self::Admin => "/admin/dashboard",
        }
    }
}

/// One account row. Token fields hold SHA-256 digests, never raw tokens.
#[derive(Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub(crate) password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Credentials and token digests stay out of logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("verified", &self.verified)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Fields required to create an account; the caller hashes the password and
/// digests the verification token first.
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verification_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("credential store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

fn unavailable(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(what))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Backend chosen once at startup.
pub enum CredentialStore {
    Postgres(PgPool),
    Memory(MemoryStore),
}

impl CredentialStore {
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::default())
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Liveness probe used by the health endpoint.
    ///
    /// # Errors
    /// Returns `Unavailable` when the backend does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                let query = "SELECT 1";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "SELECT",
                    db.statement = query
                );
                sqlx::query(query)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .map_err(|err| unavailable(err, "database ping failed"))?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    /// # Errors
    /// Returns `DuplicateEmail` when the email is taken, `Unavailable` on
    /// storage faults. Uniqueness is enforced by the backend, concurrent
    /// signups with the same email resolve to exactly one winner.
    pub async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        match self {
            Self::Postgres(pool) => pg_create(pool, new).await,
            Self::Memory(store) => store.create(new).await,
        }
    }

    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                pg_find_one(pool, "SELECT * FROM accounts WHERE email = $1", email).await
            }
            Self::Memory(store) => Ok(store.find(|account| account.email == email).await),
        }
    }

    /// Look up an unconsumed verification token by digest. Verification
    /// tokens carry no expiry, they stay valid until consumed.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn find_by_verification_token(
        &self,
        digest: &str,
    ) -> Result<Option<Account>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                pg_find_one(
                    pool,
                    "SELECT * FROM accounts WHERE verification_token = $1",
                    digest,
                )
                .await
            }
            Self::Memory(store) => {
                Ok(store
                    .find(|account| account.verification_token.as_deref() == Some(digest))
                    .await)
            }
        }
    }

    /// Look up an open reset window by token digest. Expired windows are
    /// treated as not-found and cleared lazily on the way out.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn find_by_reset_token(&self, digest: &str) -> Result<Option<Account>, StoreError> {
        match self {
            Self::Postgres(pool) => pg_find_by_reset_token(pool, digest).await,
            Self::Memory(store) => store.find_by_reset_token(digest).await,
        }
    }

    /// Mark the account verified and consume its verification token.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                let query =
                    "UPDATE accounts SET verified = TRUE, verification_token = NULL WHERE id = $1";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .map_err(|err| unavailable(err, "failed to mark account verified"))?;
                Ok(())
            }
            Self::Memory(store) => {
                store
                    .mutate(id, |account| {
                        account.verified = true;
                        account.verification_token = None;
                    })
                    .await;
                Ok(())
            }
        }
    }

    /// Open (or supersede) a reset window for the account.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn set_reset_token(
        &self,
        id: Uuid,
        digest: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                let query =
                    "UPDATE accounts SET reset_token = $2, reset_token_expiry = $3 WHERE id = $1";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(digest)
                    .bind(expiry)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .map_err(|err| unavailable(err, "failed to set reset token"))?;
                Ok(())
            }
            Self::Memory(store) => {
                let digest = digest.to_string();
                store
                    .mutate(id, move |account| {
                        account.reset_token = Some(digest);
                        account.reset_token_expiry = Some(expiry);
                    })
                    .await;
                Ok(())
            }
        }
    }

    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn clear_reset_token(&self, id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                let query =
                    "UPDATE accounts SET reset_token = NULL, reset_token_expiry = NULL WHERE id = $1";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .map_err(|err| unavailable(err, "failed to clear reset token"))?;
                Ok(())
            }
            Self::Memory(store) => {
                store
                    .mutate(id, |account| {
                        account.reset_token = None;
                        account.reset_token_expiry = None;
                    })
                    .await;
                Ok(())
            }
        }
    }

    /// Replace the password hash, closing any open reset window in the same
    /// single-row statement.
    ///
    /// # Errors
    /// Returns `Unavailable` on storage faults.
    pub async fn update_password(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                let query = r"
                    UPDATE accounts
                    SET password_hash = $2, reset_token = NULL, reset_token_expiry = NULL
                    WHERE id = $1
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(new_hash)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .map_err(|err| unavailable(err, "failed to update password"))?;
                Ok(())
            }
            Self::Memory(store) => {
                let new_hash = new_hash.to_string();
                store
                    .mutate(id, move |account| {
                        account.password_hash = new_hash;
                        account.reset_token = None;
                        account.reset_token_expiry = None;
                    })
                    .await;
                Ok(())
            }
        }
    }
}

/// Create the accounts table when it does not exist yet.
///
/// # Errors
/// Returns an error when the statement cannot be executed.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    let query = r"
        CREATE TABLE IF NOT EXISTS accounts (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            verification_token TEXT,
            reset_token TEXT,
            reset_token_expiry TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL
        )
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "CREATE",
        db.statement = query
    );
    sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to create accounts table")?;
    Ok(())
}

fn account_from_row(row: &PgRow) -> Account {
    let role: String = row.get("role");
    Account {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::parse(&role).unwrap_or(Role::User),
        verified: row.get("verified"),
        verification_token: row.get("verification_token"),
        reset_token: row.get("reset_token"),
        reset_token_expiry: row.get("reset_token_expiry"),
        created_at: row.get("created_at"),
    }
}

async fn pg_create(pool: &PgPool, new: NewAccount) -> Result<Account, StoreError> {
    let query = r"
        INSERT INTO accounts
            (id, name, email, password_hash, role, verified, verification_token, created_at)
        VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7)
        RETURNING *
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.verification_token)
        .bind(Utc::now())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(account_from_row(&row)),
        Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateEmail),
        Err(err) => Err(unavailable(err, "failed to insert account")),
    }
}

async fn pg_find_one(
    pool: &PgPool,
    query: &'static str,
    value: &str,
) -> Result<Option<Account>, StoreError> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(value)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| unavailable(err, "failed to look up account"))?;
    Ok(row.map(|row| account_from_row(&row)))
}

async fn pg_find_by_reset_token(
    pool: &PgPool,
    digest: &str,
) -> Result<Option<Account>, StoreError> {
    let query = "SELECT * FROM accounts WHERE reset_token = $1 AND reset_token_expiry > NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(digest)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| unavailable(err, "failed to look up reset token"))?;

    if let Some(row) = row {
        return Ok(Some(account_from_row(&row)));
    }

    // Lazy cleanup: a matching but expired window is cleared on the miss.
    let query = r"
        UPDATE accounts
        SET reset_token = NULL, reset_token_expiry = NULL
        WHERE reset_token = $1 AND reset_token_expiry <= NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(digest)
        .execute(pool)
        .instrument(span)
        .await
        .map_err(|err| unavailable(err, "failed to clear expired reset token"))?;

    Ok(None)
}

/// In-memory store used when no DSN is configured and as the test double.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryStore {
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|account| account.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let account = Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            verified: false,
            verification_token: Some(new.verification_token),
            reset_token: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find<F>(&self, predicate: F) -> Option<Account>
    where
        F: Fn(&Account) -> bool,
    {
        let accounts = self.accounts.lock().await;
        accounts.values().find(|account| predicate(account)).cloned()
    }

    async fn find_by_reset_token(&self, digest: &str) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.accounts.lock().await;
        let now = Utc::now();
        if let Some(account) = accounts
            .values_mut()
            .find(|account| account.reset_token.as_deref() == Some(digest))
        {
            if account.reset_token_expiry.is_some_and(|expiry| expiry > now) {
                return Ok(Some(account.clone()));
            }
            // Expired window, clear it on the miss.
            account.reset_token = None;
            account.reset_token_expiry = None;
        }
        Ok(None)
    }

    async fn mutate<F>(&self, id: Uuid, apply: F)
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.accounts.lock().await;
        if let Some(account) = accounts.get_mut(&id) {
            apply(account);
        }
    }

    /// Number of stored accounts, used by tests and the health report.
    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
