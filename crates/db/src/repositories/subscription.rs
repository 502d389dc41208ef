use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use subchat_core::domain::customer::CustomerId;
use subchat_core::domain::plan::PlanId;
use subchat_core::domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};

use super::{
    parse_optional_timestamp, parse_timestamp, parse_uuid, RepositoryError,
    SubscriptionRepository,
};
use crate::DbPool;

const SELECT_COLUMNS: &str =
    "id, customer_id, plan_id, status, start_date, end_date, next_billing_date";

pub struct SqlSubscriptionRepository {
    pool: DbPool,
}

impl SqlSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for SqlSubscriptionRepository {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO subscription (
                id, customer_id, plan_id, status,
                start_date, end_date, next_billing_date, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(subscription.id.0.to_string())
        .bind(subscription.customer_id.0.to_string())
        .bind(&subscription.plan_id.0)
        .bind(subscription.status.as_str())
        .bind(subscription.start_date.to_rfc3339())
        .bind(subscription.end_date.map(|date| date.to_rfc3339()))
        .bind(subscription.next_billing_date.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscription WHERE id = ?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(subscription_from_row).transpose()
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE subscription
             SET status = ?, end_date = ?, next_billing_date = ?
             WHERE id = ?",
        )
        .bind(subscription.status.as_str())
        .bind(subscription.end_date.map(|date| date.to_rfc3339()))
        .bind(subscription.next_billing_date.to_rfc3339())
        .bind(subscription.id.0.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM subscription
                 WHERE customer_id = ? AND status = ?
                 ORDER BY created_at DESC"
            ))
            .bind(customer_id.0.to_string())
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM subscription
                 WHERE customer_id = ?
                 ORDER BY created_at DESC"
            ))
            .bind(customer_id.0.to_string())
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(subscription_from_row).collect()
    }
}

fn subscription_from_row(row: SqliteRow) -> Result<Subscription, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = SubscriptionStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown subscription status `{status_raw}`"))
    })?;

    Ok(Subscription {
        id: SubscriptionId(parse_uuid("id", row.try_get("id")?)?),
        customer_id: CustomerId(parse_uuid("customer_id", row.try_get("customer_id")?)?),
        plan_id: PlanId(row.try_get("plan_id")?),
        status,
        start_date: parse_timestamp("start_date", row.try_get("start_date")?)?,
        end_date: parse_optional_timestamp("end_date", row.try_get("end_date")?)?,
        next_billing_date: parse_timestamp("next_billing_date", row.try_get("next_billing_date")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use subchat_core::domain::customer::CustomerId;
    use subchat_core::domain::plan::PlanId;
    use subchat_core::domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{SubscriptionRepository, SqlSubscriptionRepository};

    async fn prepared_pool() -> crate::DbPool {
        let url = format!("sqlite:file:sub-repo-{}?mode=memory&cache=shared", Uuid::new_v4());
        let pool = connect_with_settings(&url, 2, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");
        pool
    }

    async fn seed_customer_and_plan(pool: &crate::DbPool, customer_id: &CustomerId) {
        sqlx::query("INSERT INTO customer (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(customer_id.0.to_string())
            .bind("Ada")
            .bind("ada@example.com")
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .expect("customer seed");
        sqlx::query("INSERT INTO plan (id, name, price, billing_cycle) VALUES (?, ?, ?, ?)")
            .bind("premium")
            .bind("Premium")
            .bind("29.99")
            .bind("monthly")
            .execute(pool)
            .await
            .expect("plan seed");
    }

    fn subscription_fixture(customer_id: &CustomerId) -> Subscription {
        Subscription {
            id: SubscriptionId(Uuid::new_v4()),
            customer_id: customer_id.clone(),
            plan_id: PlanId("premium".to_string()),
            status: SubscriptionStatus::Active,
            start_date: Utc::now(),
            end_date: None,
            next_billing_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_is_visible_to_subsequent_reads() {
        let pool = prepared_pool().await;
        let customer_id = CustomerId(Uuid::new_v4());
        seed_customer_and_plan(&pool, &customer_id).await;
        let repository = SqlSubscriptionRepository::new(pool.clone());

        let subscription = subscription_fixture(&customer_id);
        repository.create(&subscription).await.expect("create should succeed");

        let found = repository
            .find_by_id(&subscription.id)
            .await
            .expect("find should succeed")
            .expect("subscription should exist");
        assert_eq!(found, subscription);

        let listed = repository
            .list_by_customer(&customer_id, Some(SubscriptionStatus::Active))
            .await
            .expect("list should succeed");
        assert_eq!(listed.len(), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn update_persists_cancellation() {
        let pool = prepared_pool().await;
        let customer_id = CustomerId(Uuid::new_v4());
        seed_customer_and_plan(&pool, &customer_id).await;
        let repository = SqlSubscriptionRepository::new(pool.clone());

        let mut subscription = subscription_fixture(&customer_id);
        repository.create(&subscription).await.expect("create should succeed");

        subscription.cancel(Utc::now()).expect("cancel transition");
        repository.update(&subscription).await.expect("update should succeed");

        let found = repository
            .find_by_id(&subscription.id)
            .await
            .expect("find should succeed")
            .expect("subscription should exist");
        assert_eq!(found.status, SubscriptionStatus::Cancelled);
        assert!(found.end_date.is_some());

        let active = repository
            .list_by_customer(&customer_id, Some(SubscriptionStatus::Active))
            .await
            .expect("list should succeed");
        assert!(active.is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn listing_filters_by_customer() {
        let pool = prepared_pool().await;
        let customer_id = CustomerId(Uuid::new_v4());
        let other_customer = CustomerId(Uuid::new_v4());
        seed_customer_and_plan(&pool, &customer_id).await;
        sqlx::query("INSERT INTO customer (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(other_customer.0.to_string())
            .bind("Grace")
            .bind("grace@example.com")
            .bind(Utc::now().to_rfc3339())
            .execute(&pool)
            .await
            .expect("customer seed");
        let repository = SqlSubscriptionRepository::new(pool.clone());

        repository
            .create(&subscription_fixture(&customer_id))
            .await
            .expect("create should succeed");
        repository
            .create(&subscription_fixture(&other_customer))
            .await
            .expect("create should succeed");

        let listed = repository
            .list_by_customer(&customer_id, None)
            .await
            .expect("list should succeed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].customer_id, customer_id);

        pool.close().await;
    }
}
