use std::collections::HashMap;

use tokio::sync::RwLock;

use subchat_core::domain::billing::{BillingRecord, BillingStatus};
use subchat_core::domain::customer::{Customer, CustomerId};
use subchat_core::domain::plan::{Plan, PlanId};
use subchat_core::domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};

use super::{
    BillingRepository, CustomerRepository, PlanRepository, RepositoryError,
    SubscriptionRepository,
};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<CustomerId, Customer>>,
}

impl InMemoryCustomerRepository {
    pub async fn save(&self, customer: Customer) {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.clone(), customer);
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: RwLock<Vec<Plan>>,
}

impl InMemoryPlanRepository {
    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self { plans: RwLock::new(plans) }
    }
}

#[async_trait::async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError> {
        let plans = self.plans.read().await;
        Ok(plans.iter().find(|plan| &plan.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Plan>, RepositoryError> {
        let plans = self.plans.read().await;
        Ok(plans.clone())
    }
}

/// Insertion order stands in for creation order; listings reverse it to
/// mirror the SQL repository's most-recently-created-first contract.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<Vec<Subscription>>,
}

#[async_trait::async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.iter().find(|subscription| &subscription.id == id).cloned())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let mut subscriptions = self.subscriptions.write().await;
        if let Some(existing) =
            subscriptions.iter_mut().find(|existing| existing.id == subscription.id)
        {
            *existing = subscription.clone();
        }
        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .rev()
            .filter(|subscription| &subscription.customer_id == customer_id)
            .filter(|subscription| status.map_or(true, |status| subscription.status == status))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBillingRepository {
    records: RwLock<Vec<BillingRecord>>,
}

#[async_trait::async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn insert(&self, record: &BillingRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(())
    }

    async fn list_by_customer(
        &self,
        customer_id: &CustomerId,
        status: Option<BillingStatus>,
        limit: u32,
    ) -> Result<Vec<BillingRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<BillingRecord> = records
            .iter()
            .filter(|record| &record.customer_id == customer_id)
            .filter(|record| status.map_or(true, |status| record.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
