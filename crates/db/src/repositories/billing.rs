use sqlx::{sqlite::SqliteRow, Row};

use subchat_core::domain::billing::{BillingRecord, BillingStatus};
use subchat_core::domain::customer::CustomerId;

use super::{parse_decimal, parse_timestamp, parse_uuid, BillingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBillingRepository {
    pool: DbPool,
}

impl SqlBillingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BillingRepository for SqlBillingRepository {
    async fn insert(&self, record: &BillingRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO billing_record (id, customer_id, amount, status, transaction_date)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.customer_id.0.to_string())
        .bind(record.amount.to_string())
        .bind(record.status.as_str())
        .bind(record.transaction_date.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<BillingStatus>,
        limit: u32,
    ) -> Result<Vec<BillingRecord>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(
                "SELECT id, customer_id, amount, status, transaction_date
                 FROM billing_record
                 WHERE customer_id = ? AND status = ?
                 ORDER BY transaction_date DESC
                 LIMIT ?",
            )
            .bind(customer_id.0.to_string())
            .bind(status.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, customer_id, amount, status, transaction_date
                 FROM billing_record
                 WHERE customer_id = ?
                 ORDER BY transaction_date DESC
                 LIMIT ?",
            )
            .bind(customer_id.0.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: SqliteRow) -> Result<BillingRecord, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = BillingStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown billing status `{status_raw}`"))
    })?;

    Ok(BillingRecord {
        id: parse_uuid("id", row.try_get("id")?)?,
        customer_id: CustomerId(parse_uuid("customer_id", row.try_get("customer_id")?)?),
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        status,
        transaction_date: parse_timestamp("transaction_date", row.try_get("transaction_date")?)?,
    })
}
