use std::path::Path;

use sqlx::{Sqlite, migrate::Migrator};
use time::OffsetDateTime;

static MIGRATOR: Migrator = sqlx::migrate!(); // defaults to "./migrations"

#[derive(Debug, Clone)]
pub struct Db(sqlx::Pool<Sqlite>);

/// Lifecycle of an initiated payment. Every state except `Initiated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initiated,
    Confirmed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    #[serde(skip_serializing)]
    pub phone: String,
    pub amount: i64,
    pub item: Option<String>,
    pub status: PaymentStatus,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub receipt: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug)]
pub struct NewPayment<'a> {
    pub checkout_request_id: &'a str,
    pub merchant_request_id: Option<&'a str>,
    pub phone: &'a str,
    pub amount: u64,
    pub item: Option<&'a str>,
}

/// Final outcome reported by the payment gateway callback.
#[derive(Debug)]
pub struct PaymentOutcome<'a> {
    pub status: PaymentStatus,
    pub result_code: i64,
    pub result_desc: &'a str,
    pub receipt: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// Record was already in a terminal state, nothing changed
    AlreadyFinal(PaymentStatus),
    NotFound,
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl Db {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        tracing::debug!(%database_url);
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = Path::new(path.split('?').next().unwrap_or(path));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::OpenOptions::new()
                .write(true)
                .truncate(false)
                .create(true)
                .open(path)
                .await?;
        }
        let pool = sqlx::Pool::connect(database_url).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self(pool))
    }

    /// Private in-memory database, a single connection keeps every query on the same store.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        Self(pool)
    }

    pub async fn insert_payment(&self, payment: &NewPayment<'_>) -> sqlx::Result<()> {
        let amount = i64::try_from(payment.amount).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let now = now();
        sqlx::query(
            "INSERT INTO payments (checkout_request_id, merchant_request_id, phone, amount, item, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payment.checkout_request_id)
        .bind(payment.merchant_request_id)
        .bind(payment.phone)
        .bind(amount)
        .bind(payment.item)
        .bind(PaymentStatus::Initiated)
        .bind(now)
        .bind(now)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    pub async fn get_payment(&self, checkout_request_id: &str) -> sqlx::Result<Option<PaymentRecord>> {
        sqlx::query_as(
            "SELECT checkout_request_id, merchant_request_id, phone, amount, item, status, result_code, result_desc, receipt, created_at, updated_at \
             FROM payments WHERE checkout_request_id = ?",
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.0)
        .await
    }

    /// Applies a callback outcome to a payment that is still `Initiated`.
    pub async fn resolve_payment(
        &self,
        checkout_request_id: &str,
        outcome: &PaymentOutcome<'_>,
    ) -> sqlx::Result<Resolution> {
        let updated = sqlx::query(
            "UPDATE payments SET status = ?, result_code = ?, result_desc = ?, receipt = ?, updated_at = ? \
             WHERE checkout_request_id = ? AND status = ?",
        )
        .bind(outcome.status)
        .bind(outcome.result_code)
        .bind(outcome.result_desc)
        .bind(outcome.receipt)
        .bind(now())
        .bind(checkout_request_id)
        .bind(PaymentStatus::Initiated)
        .execute(&self.0)
        .await?
        .rows_affected();
        if updated > 0 {
            return Ok(Resolution::Applied);
        }
        Ok(match self.get_payment(checkout_request_id).await? {
            Some(record) => Resolution::AlreadyFinal(record.status),
            None => Resolution::NotFound,
        })
    }

    /// Moves an `Initiated` payment created at or before `deadline` (unix seconds) to `TimedOut`.
    ///
    /// Returns the record as it is after the check.
    pub async fn expire_payment(
        &self,
        checkout_request_id: &str,
        deadline: i64,
    ) -> sqlx::Result<Option<PaymentRecord>> {
        sqlx::query(
            "UPDATE payments SET status = ?, updated_at = ? \
             WHERE checkout_request_id = ? AND status = ? AND created_at <= ?",
        )
        .bind(PaymentStatus::TimedOut)
        .bind(now())
        .bind(checkout_request_id)
        .bind(PaymentStatus::Initiated)
        .bind(deadline)
        .execute(&self.0)
        .await?;
        self.get_payment(checkout_request_id).await
    }
}
