//! Postgres-backed account store.
//!
//! Each `commit()` runs in one SQL transaction; every conditional write is an
//! `UPDATE ... WHERE version = $expected`, so a concurrent writer (another
//! process sharing the database, or a reseed) makes the batch roll back
//! instead of being silently overwritten. Versions come from the
//! `account_versions` sequence and therefore survive `seed()`.
//!
//! Batches run with `SET LOCAL statement_timeout` / `lock_timeout`, so a slow
//! commit is cancelled and rolled back by the server rather than abandoned
//! by the caller with an unknown outcome.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use coffer_accounting::Account;
use coffer_core::{AccountName, ExpectedVersion};

use super::r#trait::{AccountStore, AccountStoreError, AccountWrite};

const SCHEMA: &[&str] = &[
    "CREATE SEQUENCE IF NOT EXISTS account_versions",
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        name    TEXT PRIMARY KEY,
        balance NUMERIC NOT NULL CHECK (balance >= 0),
        version BIGINT NOT NULL
    )
    "#,
];

/// Postgres-backed account store.
///
/// Uses a SQLx connection pool, which is thread-safe and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresAccountStore {
    pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: Self::DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Server-side bound on each statement (and lock wait) inside a batch.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    async fn begin_bounded(&self) -> Result<Transaction<'static, Postgres>, AccountStoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        // SET does not take bind parameters; the value is a plain integer (ms).
        let millis = self.statement_timeout.as_millis().max(1);
        for setting in ["statement_timeout", "lock_timeout"] {
            sqlx::query(&format!("SET LOCAL {setting} = {millis}"))
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        Ok(tx)
    }

    pub async fn connect(database_url: &str) -> Result<Self, AccountStoreError> {
        let pool = PgPool::connect(database_url).await.map_err(backend)?;
        Ok(Self::new(pool))
    }

    /// Create the table and version sequence if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), AccountStoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn apply_write(
        tx: &mut Transaction<'_, Postgres>,
        write: &AccountWrite,
    ) -> Result<Account, AccountStoreError> {
        let name = write.account.name();
        let balance = write.account.balance();

        let row = match write.expected {
            ExpectedVersion::Any => sqlx::query(
                r#"
                INSERT INTO accounts (name, balance, version)
                VALUES ($1, $2, nextval('account_versions'))
                ON CONFLICT (name) DO UPDATE
                    SET balance = EXCLUDED.balance, version = EXCLUDED.version
                RETURNING name, balance, version
                "#,
            )
            .bind(name.as_str())
            .bind(balance)
            .fetch_one(&mut **tx)
            .await
            .map_err(backend)?,
            ExpectedVersion::Exact(expected) => {
                let updated = sqlx::query(
                    r#"
                    UPDATE accounts
                    SET balance = $2, version = nextval('account_versions')
                    WHERE name = $1 AND version = $3
                    RETURNING name, balance, version
                    "#,
                )
                .bind(name.as_str())
                .bind(balance)
                .bind(to_db_version(expected)?)
                .fetch_optional(&mut **tx)
                .await
                .map_err(backend)?;

                match updated {
                    Some(row) => row,
                    None => return Err(Self::explain_missed_update(tx, write).await),
                }
            }
        };

        row_to_account(&row)
    }

    /// Distinguish "record gone" from "record changed" after a conditional update matched nothing.
    async fn explain_missed_update(
        tx: &mut Transaction<'_, Postgres>,
        write: &AccountWrite,
    ) -> AccountStoreError {
        let name = write.account.name();
        let current = sqlx::query("SELECT version FROM accounts WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&mut **tx)
            .await;

        match current {
            Ok(Some(row)) => match row.try_get::<i64, _>("version").map_err(backend) {
                Ok(actual) => AccountStoreError::VersionMismatch {
                    name: name.clone(),
                    expected: write.expected,
                    actual: u64::try_from(actual).unwrap_or_default(),
                },
                Err(e) => e,
            },
            Ok(None) => AccountStoreError::MissingAccount(name.clone()),
            Err(e) => backend(e),
        }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError> {
        let row = sqlx::query("SELECT name, balance, version FROM accounts WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn list(&self) -> Result<Vec<Account>, AccountStoreError> {
        let rows = sqlx::query("SELECT name, balance, version FROM accounts ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_account).collect()
    }

    async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError> {
        let mut tx = self.begin_bounded().await?;

        let mut committed = Vec::with_capacity(writes.len());
        for write in &writes {
            // Returning early drops `tx`, which rolls the batch back.
            committed.push(Self::apply_write(&mut tx, write).await?);
        }

        tx.commit().await.map_err(backend)?;
        Ok(committed)
    }

    async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError> {
        let mut tx = self.begin_bounded().await?;

        sqlx::query("DELETE FROM accounts")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let mut committed = Vec::with_capacity(accounts.len());
        for account in accounts {
            let row = sqlx::query(
                r#"
                INSERT INTO accounts (name, balance, version)
                VALUES ($1, $2, nextval('account_versions'))
                RETURNING name, balance, version
                "#,
            )
            .bind(account.name().as_str())
            .bind(account.balance())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
                if duplicate {
                    AccountStoreError::InvalidRecord(format!(
                        "seed contains '{}' more than once",
                        account.name()
                    ))
                } else {
                    backend(e)
                }
            })?;
            committed.push(row_to_account(&row)?);
        }

        tx.commit().await.map_err(backend)?;
        Ok(committed)
    }
}

/// SQLSTATEs raised when `statement_timeout` / `lock_timeout` cancel a statement.
const QUERY_CANCELED: &str = "57014";
const LOCK_NOT_AVAILABLE: &str = "55P03";

fn backend(err: sqlx::Error) -> AccountStoreError {
    let timed_out = matches!(
        &err,
        sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some(QUERY_CANCELED) | Some(LOCK_NOT_AVAILABLE))
    );
    if timed_out {
        AccountStoreError::Timeout(err.to_string())
    } else {
        AccountStoreError::Backend(err.to_string())
    }
}

fn to_db_version(version: u64) -> Result<i64, AccountStoreError> {
    i64::try_from(version)
        .map_err(|_| AccountStoreError::InvalidRecord(format!("version {version} out of range")))
}

fn row_to_account(row: &PgRow) -> Result<Account, AccountStoreError> {
    let name: String = row.try_get("name").map_err(backend)?;
    let balance: Decimal = row.try_get("balance").map_err(backend)?;
    let version: i64 = row.try_get("version").map_err(backend)?;

    let name = AccountName::parse(name).map_err(|e| AccountStoreError::InvalidRecord(e.to_string()))?;
    let version = u64::try_from(version)
        .map_err(|_| AccountStoreError::InvalidRecord(format!("negative version for '{name}'")))?;

    Account::restore(name, balance, version).map_err(|e| AccountStoreError::InvalidRecord(e.to_string()))
}
