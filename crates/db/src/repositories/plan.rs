use sqlx::{sqlite::SqliteRow, Row};

use subchat_core::domain::plan::{BillingCycle, Plan, PlanId};

use super::{parse_decimal, PlanRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPlanRepository {
    pool: DbPool,
}

impl SqlPlanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PlanRepository for SqlPlanRepository {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, name, price, billing_cycle FROM plan WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(plan_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Plan>, RepositoryError> {
        let rows =
            sqlx::query("SELECT id, name, price, billing_cycle FROM plan ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(plan_from_row).collect()
    }
}

fn plan_from_row(row: SqliteRow) -> Result<Plan, RepositoryError> {
    let cycle_raw = row.try_get::<String, _>("billing_cycle")?;
    let billing_cycle = BillingCycle::parse(&cycle_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown billing cycle `{cycle_raw}`")))?;

    Ok(Plan {
        id: PlanId(row.try_get("id")?),
        name: row.try_get("name")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        billing_cycle,
    })
}
