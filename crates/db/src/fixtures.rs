//! Deterministic seed dataset for local runs and integration tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::DbPool;

/// Fixed demo customer id so local tooling can address it directly.
pub const DEMO_CUSTOMER_ID: &str = "00000000-0000-0000-0000-000000000001";

pub struct SeedResult {
    pub plans: usize,
    pub customers: usize,
    pub subscriptions: usize,
    pub billing_records: usize,
}

const PLAN_SEEDS: &[(&str, &str, &str, &str)] = &[
    ("starter", "Starter", "9.99", "monthly"),
    ("premium", "Premium", "29.99", "monthly"),
    ("enterprise", "Enterprise", "99.99", "monthly"),
    ("pro-annual", "Pro Annual", "199.99", "yearly"),
];

/// Seeds the demo catalog, one demo customer, an active premium
/// subscription and a short billing history. Idempotent: existing rows
/// are left untouched.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
    let mut result =
        SeedResult { plans: 0, customers: 0, subscriptions: 0, billing_records: 0 };

    for (id, name, price, cycle) in PLAN_SEEDS {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO plan (id, name, price, billing_cycle) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(cycle)
        .execute(pool)
        .await?;
        result.plans += inserted.rows_affected() as usize;
    }

    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO customer (id, name, email, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(DEMO_CUSTOMER_ID)
    .bind("Demo Customer")
    .bind("demo@example.com")
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;
    result.customers += inserted.rows_affected() as usize;

    if result.customers > 0 {
        let subscription_id = Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT INTO subscription (
                id, customer_id, plan_id, status,
                start_date, end_date, next_billing_date, created_at
             ) VALUES (?, ?, 'premium', 'active', ?, NULL, ?, ?)",
        )
        .bind(&subscription_id)
        .bind(DEMO_CUSTOMER_ID)
        .bind((now - Duration::days(90)).to_rfc3339())
        .bind((now + Duration::days(30)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;
        result.subscriptions += inserted.rows_affected() as usize;

        for months_ago in 1..=3 {
            let inserted = sqlx::query(
                "INSERT INTO billing_record (id, customer_id, amount, status, transaction_date)
                 VALUES (?, ?, '29.99', 'paid', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(DEMO_CUSTOMER_ID)
            .bind((now - Duration::days(30 * months_ago)).to_rfc3339())
            .execute(pool)
            .await?;
            result.billing_records += inserted.rows_affected() as usize;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::connect_with_settings;
    use crate::migrations::run_pending;

    use super::seed_demo_data;

    #[tokio::test]
    async fn seeding_twice_does_not_duplicate() {
        let url = format!("sqlite:file:seed-{}?mode=memory&cache=shared", Uuid::new_v4());
        let pool = connect_with_settings(&url, 2, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");

        let first = seed_demo_data(&pool).await.expect("first seed should succeed");
        assert_eq!(first.plans, 4);
        assert_eq!(first.customers, 1);
        assert_eq!(first.subscriptions, 1);
        assert_eq!(first.billing_records, 3);

        let second = seed_demo_data(&pool).await.expect("second seed should succeed");
        assert_eq!(second.plans, 0);
        assert_eq!(second.customers, 0);
        assert_eq!(second.subscriptions, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription")
            .fetch_one(&pool)
            .await
            .expect("count query");
        assert_eq!(count, 1);

        pool.close().await;
    }
}
