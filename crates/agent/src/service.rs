//! One inbound message in, one reply out.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use subchat_core::domain::customer::CustomerId;
use subchat_core::domain::plan::Plan;
use subchat_core::intent::ConversationTurn;

use subchat_db::repositories::{
    BillingRepository, CustomerRepository, PlanRepository, SubscriptionRepository,
};

use crate::dispatcher::{ChatReply, Dispatcher};
use crate::llm::LlmClient;
use crate::resolver::IntentResolver;

/// One chat turn from a caller. History is caller-supplied and never
/// persisted server-side.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub customer_id: CustomerId,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

pub struct ChatService {
    plans: Arc<dyn PlanRepository>,
    resolver: IntentResolver,
    dispatcher: Dispatcher,
}

impl ChatService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        billing: Arc<dyn BillingRepository>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let resolver = IntentResolver::new(llm.clone());
        let dispatcher =
            Dispatcher::new(customers, plans.clone(), subscriptions, billing, llm);
        Self { plans, resolver, dispatcher }
    }

    pub async fn handle(&self, request: &ChatRequest) -> ChatReply {
        // An unreadable catalog degrades resolution (no plan-name
        // detection, no tool schema enum) but never drops the turn;
        // per-action store errors surface from the dispatcher.
        let catalog: Vec<Plan> = match self.plans.list().await {
            Ok(catalog) => catalog,
            Err(repository_error) => {
                warn!(
                    event_name = "chat.catalog_unavailable",
                    error = %repository_error,
                    "resolving without the plan catalog"
                );
                Vec::new()
            }
        };

        let intent =
            self.resolver.resolve(&request.message, &catalog, &request.history).await;
        info!(
            event_name = "chat.intent_resolved",
            action = intent.action.as_str(),
            confidence = intent.confidence,
            "inbound message resolved"
        );

        self.dispatcher
            .dispatch(&intent, &request.customer_id, &request.message, &request.history)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use uuid::Uuid;

    use subchat_core::domain::customer::{Customer, CustomerId};
    use subchat_core::domain::plan::{BillingCycle, Plan, PlanId};
    use subchat_core::intent::ChatAction;

    use subchat_db::repositories::{
        InMemoryBillingRepository, InMemoryCustomerRepository, InMemoryPlanRepository,
        InMemorySubscriptionRepository,
    };

    use super::{ChatRequest, ChatService};

    async fn service() -> (CustomerId, ChatService) {
        let customer_id = CustomerId(Uuid::new_v4());
        let customers = Arc::new(InMemoryCustomerRepository::default());
        customers
            .save(Customer {
                id: customer_id.clone(),
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
            })
            .await;
        let plans = Arc::new(InMemoryPlanRepository::with_plans(vec![Plan {
            id: PlanId("starter".to_string()),
            name: "Starter".to_string(),
            price: Decimal::new(999, 2),
            billing_cycle: BillingCycle::Monthly,
        }]));

        let service = ChatService::new(
            customers,
            plans,
            Arc::new(InMemorySubscriptionRepository::default()),
            Arc::new(InMemoryBillingRepository::default()),
            None,
        );
        (customer_id, service)
    }

    fn request(customer_id: &CustomerId, message: &str) -> ChatRequest {
        ChatRequest {
            customer_id: customer_id.clone(),
            message: message.to_string(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn subscribe_message_flows_through_to_a_created_subscription() {
        let (customer_id, service) = service().await;

        let reply = service
            .handle(&request(&customer_id, "subscribe me to the starter plan"))
            .await;
        assert_eq!(reply.action, ChatAction::CreateSubscription);
        assert!(reply.text.contains("Starter"));

        let view = service.handle(&request(&customer_id, "show me my subscriptions")).await;
        assert_eq!(view.action, ChatAction::ViewSubscriptions);
        assert!(view.text.contains("Starter"));
    }

    #[tokio::test]
    async fn unclassifiable_message_without_backend_gets_the_capability_summary() {
        let (customer_id, service) = service().await;

        let reply = service.handle(&request(&customer_id, "hello there")).await;
        assert_eq!(reply.action, ChatAction::GeneralQuery);
        assert!(reply.text.contains("What would you like to do?"));
    }
}
