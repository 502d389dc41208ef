use async_trait::async_trait;
use thiserror::Error;

use subchat_core::domain::billing::{BillingRecord, BillingStatus};
use subchat_core::domain::customer::{Customer, CustomerId};
use subchat_core::domain::plan::{Plan, PlanId};
use subchat_core::domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};

pub mod billing;
pub mod customer;
pub mod memory;
pub mod plan;
pub mod subscription;

pub use billing::SqlBillingRepository;
pub use customer::SqlCustomerRepository;
pub use memory::{
    InMemoryBillingRepository, InMemoryCustomerRepository, InMemoryPlanRepository,
    InMemorySubscriptionRepository,
};
pub use plan::SqlPlanRepository;
pub use subscription::SqlSubscriptionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Plan>, RepositoryError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, RepositoryError>;

    /// Persists status, end date and next billing date for an existing
    /// subscription.
    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError>;

    /// Most-recently-created first; optional status filter.
    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, RepositoryError>;
}

#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn insert(&self, record: &BillingRecord) -> Result<(), RepositoryError>;

    /// Newest first, bounded by `limit`; optional status filter.
    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<BillingStatus>,
        limit: u32,
    ) -> Result<Vec<BillingRecord>, RepositoryError>;
}

pub(crate) fn parse_timestamp(
    column: &str,
    raw: String,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&chrono::Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp in `{column}`: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, RepositoryError> {
    raw.map(|value| parse_timestamp(column, value)).transpose()
}

pub(crate) fn parse_decimal(
    column: &str,
    raw: String,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    raw.parse()
        .map_err(|error| RepositoryError::Decode(format!("bad decimal in `{column}`: {error}")))
}

pub(crate) fn parse_uuid(column: &str, raw: String) -> Result<uuid::Uuid, RepositoryError> {
    raw.parse()
        .map_err(|error| RepositoryError::Decode(format!("bad uuid in `{column}`: {error}")))
}
