//! # Connector
//!
//! Owns the shared SQLite pool. Construct one per process and hand it to
//! every repository that needs the database; `connect` opens the pool on
//! first use and returns the same pool afterwards.

use std::str::FromStr;
use std::time::Duration;

use sqlx::error::ErrorKind;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tb_core::error::{AppError, Result};
use tokio::sync::OnceCell;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// How long a writer waits for the write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Connector {
    database_url: String,
    max_connections: u32,
    pool: OnceCell<SqlitePool>,
}

impl Connector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            pool: OnceCell::new(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Opens the pool and applies pending migrations, once.
    ///
    /// Concurrent callers wait for the same initialisation; a failed attempt
    /// leaves the connector unopened so the next call retries.
    pub async fn connect(&self) -> Result<&SqlitePool> {
        self.pool.get_or_try_init(|| self.open()).await
    }

    /// Runs a trivial query against the pool.
    pub async fn health_check(&self) -> Result<()> {
        let pool = self.connect().await?;
        sqlx::query("SELECT 1").execute(pool).await.map_err(db_err)?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.get().is_some_and(|pool| !pool.is_closed())
    }

    /// Closes the pool if it was ever opened. Later operations fail with
    /// `AppError::Connection`.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            log::info!("database pool closed");
        }
    }

    async fn open(&self) -> Result<SqlitePool> {
        let mut options = SqliteConnectOptions::from_str(&self.database_url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !self.is_in_memory() {
            // Readers never block the single writer.
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives exactly as long as its connection.
        let pool_options = if self.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(self.max_connections)
        };

        let pool = pool_options.connect_with(options).await.map_err(db_err)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))?;

        log::info!("connected to {}", self.database_url);
        Ok(pool)
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Classifies a driver error into the domain error kinds.
pub(crate) fn db_err(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => AppError::Conflict(db.message().to_string()),
            // SQLITE_BUSY / SQLITE_LOCKED
            _ if matches!(db.code().as_deref(), Some("5") | Some("6")) => {
                AppError::Conflict(db.message().to_string())
            }
            _ => AppError::Internal(e.to_string()),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => AppError::Connection(e.to_string()),
        _ => AppError::Internal(e.to_string()),
    }
}
