//! # PostgreSQL Ledger
//!
//! `BookingStore` over a `bookings` table whose primary key is the provider
//! reference. Inserts use `ON CONFLICT DO NOTHING`; zero affected rows means
//! the reference was already committed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use stay_core::{
    BookingError, BookingRecord, BookingResult, BookingStore, Currency, Money, RefundStatus,
    StayInterval,
};
use tracing::{error, info};

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS bookings (
        provider_reference TEXT PRIMARY KEY,
        resource_id TEXT NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        payer_id TEXT NOT NULL,
        amount_minor BIGINT NOT NULL,
        currency TEXT NOT NULL,
        provider TEXT NOT NULL,
        channel TEXT NOT NULL,
        paid_at TIMESTAMPTZ,
        verified_at TIMESTAMPTZ NOT NULL,
        refund_status TEXT,
        CHECK (end_date > start_date)
    )";

const CREATE_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS bookings_resource_dates
    ON bookings (resource_id, start_date, end_date)";

const SELECT_COLUMNS: &str = "
    SELECT provider_reference, resource_id, start_date, end_date, payer_id,
           amount_minor, currency, provider, channel, paid_at, verified_at,
           refund_status
    FROM bookings";

#[derive(Debug, FromRow)]
struct BookingRow {
    provider_reference: String,
    resource_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    payer_id: String,
    amount_minor: i64,
    currency: String,
    provider: String,
    channel: String,
    paid_at: Option<DateTime<Utc>>,
    verified_at: DateTime<Utc>,
    refund_status: Option<String>,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> BookingResult<Self> {
        let currency = Currency::parse(&row.currency).ok_or_else(|| {
            BookingError::UnsupportedCurrency {
                currency: row.currency.clone(),
            }
        })?;

        Ok(BookingRecord {
            interval: StayInterval::new(row.start_date, row.end_date)?,
            amount: Money::from_minor(row.amount_minor, currency),
            refund_status: row.refund_status.as_deref().and_then(RefundStatus::parse),
            provider_reference: row.provider_reference,
            resource_id: row.resource_id,
            payer_id: row.payer_id,
            provider: row.provider,
            channel: row.channel,
            paid_at: row.paid_at,
            verified_at: row.verified_at,
        })
    }
}

fn storage_error(operation: &str, err: sqlx::Error) -> BookingError {
    error!("Error occurred while trying to {}: {}", operation, err);
    BookingError::Storage(err.to_string())
}

/// Ledger backed by PostgreSQL
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub async fn connect(database_url: &str) -> BookingResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| storage_error("connect to database", e))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `bookings` table and its lookup index if missing
    pub async fn ensure_schema(&self) -> BookingResult<()> {
        for statement in [CREATE_TABLE, CREATE_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("create ledger schema", e))?;
        }
        info!("Ledger schema ready");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn candidates(
        &self,
        resource_id: &str,
        interval: &StayInterval,
    ) -> BookingResult<Vec<BookingRecord>> {
        let query = format!(
            "{} WHERE resource_id = $1 AND start_date < $3 AND end_date > $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&query)
            .bind(resource_id)
            .bind(interval.start())
            .bind(interval.end())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("fetch candidate bookings", e))?;

        rows.into_iter().map(BookingRecord::try_from).collect()
    }

    async fn insert(&self, record: BookingRecord) -> BookingResult<()> {
        let result = sqlx::query(
            "
            INSERT INTO bookings (
                provider_reference, resource_id, start_date, end_date, payer_id,
                amount_minor, currency, provider, channel, paid_at, verified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (provider_reference) DO NOTHING
            ",
        )
        .bind(&record.provider_reference)
        .bind(&record.resource_id)
        .bind(record.interval.start())
        .bind(record.interval.end())
        .bind(&record.payer_id)
        .bind(record.amount.amount_minor)
        .bind(record.amount.currency.as_str())
        .bind(&record.provider)
        .bind(&record.channel)
        .bind(record.paid_at)
        .bind(record.verified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("insert booking", e))?;

        if result.rows_affected() == 0 {
            return Err(BookingError::DuplicateReference {
                reference: record.provider_reference,
            });
        }
        Ok(())
    }

    async fn find(&self, provider_reference: &str) -> BookingResult<Option<BookingRecord>> {
        let query = format!("{} WHERE provider_reference = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(provider_reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("fetch booking by reference", e))?;

        row.map(BookingRecord::try_from).transpose()
    }

    async fn annotate_refund(
        &self,
        provider_reference: &str,
        status: RefundStatus,
    ) -> BookingResult<bool> {
        let result =
            sqlx::query("UPDATE bookings SET refund_status = $2 WHERE provider_reference = $1")
                .bind(provider_reference)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("annotate refund", e))?;

        Ok(result.rows_affected() > 0)
    }
}
