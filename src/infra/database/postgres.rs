//! PostgreSQL ledger implementation.
//!
//! The `(lt, hash)` unique constraint is the deduplication mechanism: an
//! insert racing with another observation of the same on-chain transaction
//! resolves at the database, not in process memory.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    AppError, CandidateTransaction, DatabaseError, LedgerStore, TransactionRecord,
    TransactionStatus,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

const RECORD_COLUMNS: &str = "id, lt, hash, user_address, from_address, to_address, \
     amount_nanotons, jetton_amount, status, error_message, retry_count, \
     processed_at, created_at, updated_at";

/// PostgreSQL ledger with connection pooling
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Create a new PostgreSQL ledger with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL ledger with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Parse a database row into a TransactionRecord
    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<TransactionRecord, AppError> {
        let status_str: String = row.get("status");

        Ok(TransactionRecord {
            id: row.get("id"),
            lt: row.get("lt"),
            hash: row.get("hash"),
            user_address: row.get("user_address"),
            from_address: row.get("from_address"),
            to_address: row.get("to_address"),
            amount_nanotons: row.get("amount_nanotons"),
            jetton_amount: row.get("jetton_amount"),
            status: status_str.parse().unwrap_or(TransactionStatus::Pending),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            processed_at: row.get("processed_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn insert_with_status(
        &self,
        candidate: &CandidateTransaction,
        status: TransactionStatus,
    ) -> Result<Option<TransactionRecord>, AppError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO relayer_transactions (
                id, lt, hash, user_address, from_address, to_address,
                amount_nanotons, status, retry_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (lt, hash) DO NOTHING
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(candidate.lt)
        .bind(&candidate.hash)
        .bind(&candidate.user_address)
        .bind(&candidate.from_address)
        .bind(&candidate.to_address)
        .bind(candidate.value_nanotons)
        .bind(status.as_str())
        .bind(0i32)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self, candidate), fields(lt = candidate.lt, hash = %candidate.hash))]
    async fn try_create(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError> {
        self.insert_with_status(candidate, TransactionStatus::Processing)
            .await
    }

    #[instrument(skip(self, candidate), fields(lt = candidate.lt, hash = %candidate.hash))]
    async fn insert_pending(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError> {
        self.insert_with_status(candidate, TransactionStatus::Pending)
            .await
    }

    #[instrument(skip(self))]
    async fn mark_processing(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE relayer_transactions
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound(format!(
                "no pending record {}",
                id
            ))));
        }
        Ok(())
    }

    #[instrument(skip(self, error_message))]
    async fn finalize(
        &self,
        id: Uuid,
        status: TransactionStatus,
        error_message: Option<&str>,
        jetton_amount: Option<i64>,
    ) -> Result<(), AppError> {
        let now = Utc::now();

        // Terminal records are immutable; the status guard makes a late or
        // duplicate finalize a no-op error instead of an overwrite.
        let result = sqlx::query(
            r#"
            UPDATE relayer_transactions
            SET status = $1,
                error_message = $2,
                jetton_amount = COALESCE($3, jetton_amount),
                processed_at = $4,
                updated_at = $4
            WHERE id = $5
              AND status NOT IN ('completed', 'failed', 'refunded')
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(jetton_amount)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound(format!(
                "no active record {}",
                id
            ))));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn increment_retry_count(&self, id: Uuid) -> Result<i32, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE relayer_transactions
            SET retry_count = retry_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(row.get("retry_count"))
    }

    #[instrument(skip(self))]
    async fn find_by_key(
        &self,
        lt: i64,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM relayer_transactions WHERE lt = $1 AND hash = $2"
        ))
        .bind(lt)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, AppError> {
        let limit = limit.clamp(1, 500);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM relayer_transactions
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
