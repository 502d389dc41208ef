//! Executes resolved intents against the store.
//!
//! Every arm returns a reply, never an error: failures are translated
//! into their user-safe message with a machine-readable code in the
//! payload, and missing parameters produce a clarifying question
//! instead of a refusal.

use std::sync::Arc;

use chrono::{Months, Utc};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use subchat_core::domain::customer::CustomerId;
use subchat_core::domain::plan::{BillingCycle, Plan};
use subchat_core::domain::subscription::{
    Subscription, SubscriptionId, SubscriptionStatus,
};
use subchat_core::errors::ChatError;
use subchat_core::intent::{ActionIntent, ChatAction, ConversationTurn, TurnRole};

use subchat_db::repositories::{
    BillingRepository, CustomerRepository, PlanRepository, RepositoryError,
    SubscriptionRepository,
};

use crate::analyzer::RecommendationAnalyzer;
use crate::llm::{ChatMessage, LlmClient, LlmOutcome};

const DEFAULT_BILLING_LIMIT: u64 = 10;
const MAX_BILLING_LIMIT: u64 = 50;

/// The assistant's side of one turn. `data` carries the structured
/// result of the action (or an `error` code) for programmatic callers.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ChatReply {
    pub text: String,
    pub action: ChatAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ChatReply {
    fn text_only(action: ChatAction, text: impl Into<String>) -> Self {
        Self { text: text.into(), action, data: None }
    }

    fn with_data(action: ChatAction, text: impl Into<String>, data: Value) -> Self {
        Self { text: text.into(), action, data: Some(data) }
    }
}

pub struct Dispatcher {
    customers: Arc<dyn CustomerRepository>,
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    billing: Arc<dyn BillingRepository>,
    llm: Option<Arc<dyn LlmClient>>,
    analyzer: RecommendationAnalyzer,
}

impl Dispatcher {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        billing: Arc<dyn BillingRepository>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let analyzer = RecommendationAnalyzer::new(
            plans.clone(),
            subscriptions.clone(),
            billing.clone(),
            llm.clone(),
        );
        Self { customers, plans, subscriptions, billing, llm, analyzer }
    }

    pub async fn dispatch(
        &self,
        intent: &ActionIntent,
        customer_id: &CustomerId,
        message: &str,
        history: &[ConversationTurn],
    ) -> ChatReply {
        info!(
            event_name = "dispatch.start",
            action = intent.action.as_str(),
            confidence = intent.confidence,
            "executing resolved intent"
        );

        match self.try_dispatch(intent, customer_id, message, history).await {
            Ok(reply) => reply,
            Err(chat_error) => {
                error!(
                    event_name = "dispatch.failed",
                    action = intent.action.as_str(),
                    code = chat_error.code(),
                    error = %chat_error,
                    "intent execution failed"
                );
                ChatReply::with_data(
                    intent.action,
                    chat_error.user_message(),
                    json!({ "error": chat_error.code() }),
                )
            }
        }
    }

    async fn try_dispatch(
        &self,
        intent: &ActionIntent,
        customer_id: &CustomerId,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatReply, ChatError> {
        match intent.action {
            ChatAction::ViewSubscriptions => self.view_subscriptions(customer_id).await,
            ChatAction::ViewBilling => self.view_billing(customer_id, intent).await,
            ChatAction::GetRecommendations => self.get_recommendations(customer_id).await,
            ChatAction::CreateSubscription => {
                self.create_subscription(customer_id, intent).await
            }
            ChatAction::CancelSubscription => {
                self.cancel_subscription(customer_id, intent).await
            }
            ChatAction::GeneralQuery => self.general_query(customer_id, message, history).await,
        }
    }

    async fn view_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<ChatReply, ChatError> {
        let subscriptions = self
            .subscriptions
            .list_by_customer(customer_id, None)
            .await
            .map_err(store_error)?;

        if subscriptions.is_empty() {
            return Ok(ChatReply::text_only(
                ChatAction::ViewSubscriptions,
                "You don't have any subscriptions yet. Ask me about our plans to get started.",
            ));
        }

        let catalog = self.plans.list().await.map_err(store_error)?;
        let mut lines = vec![format!(
            "You have {} subscription{}:",
            subscriptions.len(),
            if subscriptions.len() == 1 { "" } else { "s" }
        )];
        for subscription in &subscriptions {
            let plan_name = catalog
                .iter()
                .find(|plan| plan.id == subscription.plan_id)
                .map(|plan| plan.name.clone())
                .unwrap_or_else(|| subscription.plan_id.0.clone());
            lines.push(format!(
                "- {} ({}), next billing {}",
                plan_name,
                subscription.status.as_str(),
                subscription.next_billing_date.format("%Y-%m-%d"),
            ));
        }

        Ok(ChatReply::with_data(
            ChatAction::ViewSubscriptions,
            lines.join("\n"),
            json!({ "subscriptions": subscriptions }),
        ))
    }

    async fn view_billing(
        &self,
        customer_id: &CustomerId,
        intent: &ActionIntent,
    ) -> Result<ChatReply, ChatError> {
        let limit = intent
            .parameter_u64("limit")
            .unwrap_or(DEFAULT_BILLING_LIMIT)
            .clamp(1, MAX_BILLING_LIMIT);
        let records = self
            .billing
            .list_by_customer(customer_id, None, limit as u32)
            .await
            .map_err(store_error)?;

        if records.is_empty() {
            return Ok(ChatReply::text_only(
                ChatAction::ViewBilling,
                "There are no billing transactions on your account yet.",
            ));
        }

        let mut lines = vec![format!("Your {} most recent transactions:", records.len())];
        for record in &records {
            lines.push(format!(
                "- {}: ${:.2} ({})",
                record.transaction_date.format("%Y-%m-%d"),
                record.amount,
                record.status.as_str(),
            ));
        }

        Ok(ChatReply::with_data(
            ChatAction::ViewBilling,
            lines.join("\n"),
            json!({ "transactions": records }),
        ))
    }

    async fn get_recommendations(
        &self,
        customer_id: &CustomerId,
    ) -> Result<ChatReply, ChatError> {
        let recommendations = self.analyzer.analyze(customer_id).await?;

        if recommendations.is_empty() {
            return Ok(ChatReply::text_only(
                ChatAction::GetRecommendations,
                "Your current plans look like a good fit. I don't have any recommendations \
                 right now.",
            ));
        }

        let mut lines = Vec::new();
        for recommendation in &recommendations {
            lines.push(format!(
                "{}: {} ({})",
                recommendation.plan_name,
                recommendation.reasoning,
                recommendation.cost_implication,
            ));
        }

        Ok(ChatReply::with_data(
            ChatAction::GetRecommendations,
            lines.join("\n\n"),
            json!({ "recommendations": recommendations }),
        ))
    }

    async fn create_subscription(
        &self,
        customer_id: &CustomerId,
        intent: &ActionIntent,
    ) -> Result<ChatReply, ChatError> {
        let catalog = self.plans.list().await.map_err(store_error)?;

        // No plan named: ask which one, rather than failing the turn.
        let Some(plan_id) = intent.parameter_str("plan_id") else {
            return Ok(ChatReply::text_only(
                ChatAction::CreateSubscription,
                format!(
                    "Which plan would you like? Available plans: {}.",
                    plan_choices(&catalog)
                ),
            ));
        };

        let Some(plan) = catalog.iter().find(|plan| plan.id.0 == plan_id) else {
            return Err(ChatError::Validation(format!(
                "I don't recognize the plan `{plan_id}`. Available plans: {}.",
                plan_choices(&catalog)
            )));
        };

        self.customers
            .find_by_id(customer_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ChatError::NotFound(format!("customer {}", customer_id.0)))?;

        let now = Utc::now();
        let billing_months = match plan.billing_cycle {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12,
        };
        let subscription = Subscription {
            id: SubscriptionId(Uuid::new_v4()),
            customer_id: customer_id.clone(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: None,
            // Calendar months, not a fixed day count. Overflow is
            // unreachable for wall-clock dates.
            next_billing_date: now.checked_add_months(Months::new(billing_months)).unwrap_or(now),
        };
        self.subscriptions.create(&subscription).await.map_err(store_error)?;

        info!(
            event_name = "subscription.created",
            subscription_id = %subscription.id,
            plan_id = %plan.id,
            "subscription created"
        );

        Ok(ChatReply::with_data(
            ChatAction::CreateSubscription,
            format!(
                "You're subscribed to {} at ${:.2}/{}. Your next billing date is {}.",
                plan.name,
                plan.price,
                plan.billing_cycle.as_str(),
                subscription.next_billing_date.format("%Y-%m-%d"),
            ),
            json!({ "subscription": subscription }),
        ))
    }

    async fn cancel_subscription(
        &self,
        customer_id: &CustomerId,
        intent: &ActionIntent,
    ) -> Result<ChatReply, ChatError> {
        let Some(raw_id) = intent.parameter_str("subscription_id") else {
            let active = self
                .subscriptions
                .list_by_customer(customer_id, Some(SubscriptionStatus::Active))
                .await
                .map_err(store_error)?;
            if active.is_empty() {
                return Ok(ChatReply::text_only(
                    ChatAction::CancelSubscription,
                    "You have no active subscriptions to cancel.",
                ));
            }

            let catalog = self.plans.list().await.map_err(store_error)?;
            let mut lines =
                vec!["Which subscription should I cancel? You currently have:".to_string()];
            for subscription in &active {
                let plan_name = catalog
                    .iter()
                    .find(|plan| plan.id == subscription.plan_id)
                    .map(|plan| plan.name.clone())
                    .unwrap_or_else(|| subscription.plan_id.0.clone());
                lines.push(format!("- {} (id: {})", plan_name, subscription.id));
            }
            return Ok(ChatReply::text_only(
                ChatAction::CancelSubscription,
                lines.join("\n"),
            ));
        };

        let subscription_id = raw_id
            .parse::<Uuid>()
            .map(SubscriptionId)
            .map_err(|_| {
                ChatError::Validation(format!("`{raw_id}` is not a valid subscription id"))
            })?;

        let mut subscription = self
            .subscriptions
            .find_by_id(&subscription_id)
            .await
            .map_err(store_error)?
            // Another customer's subscription is indistinguishable from a
            // missing one.
            .filter(|subscription| &subscription.customer_id == customer_id)
            .ok_or_else(|| ChatError::NotFound(format!("subscription {subscription_id}")))?;

        subscription.cancel(Utc::now())?;
        self.subscriptions.update(&subscription).await.map_err(store_error)?;

        info!(
            event_name = "subscription.cancelled",
            subscription_id = %subscription.id,
            "subscription cancelled"
        );

        Ok(ChatReply::with_data(
            ChatAction::CancelSubscription,
            "Your subscription has been cancelled. It stays usable until the end of the \
             current billing period."
                .to_string(),
            json!({ "subscription": subscription }),
        ))
    }

    async fn general_query(
        &self,
        customer_id: &CustomerId,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatReply, ChatError> {
        const HELP_TEXT: &str = "I can show your subscriptions or billing history, recommend \
             plans, and subscribe you to or cancel a plan. What would you like to do?";

        let Some(llm) = &self.llm else {
            return Ok(ChatReply::text_only(ChatAction::GeneralQuery, HELP_TEXT));
        };

        let subscriptions = self
            .subscriptions
            .list_by_customer(customer_id, Some(SubscriptionStatus::Active))
            .await
            .map_err(store_error)?;
        let catalog = self.plans.list().await.map_err(store_error)?;
        let system = general_query_context(&subscriptions, &catalog);

        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            })
            .collect();
        messages.push(ChatMessage::user(message));

        match llm.chat(&system, &messages, &[]).await {
            Ok(LlmOutcome::Text(text)) => Ok(ChatReply::text_only(ChatAction::GeneralQuery, text)),
            // No tools were offered; fall back to the capability summary.
            Ok(LlmOutcome::ToolCall { .. }) => {
                Ok(ChatReply::text_only(ChatAction::GeneralQuery, HELP_TEXT))
            }
            Err(llm_error) => Err(ChatError::BackendUnavailable(llm_error.to_string())),
        }
    }
}

fn store_error(repository_error: RepositoryError) -> ChatError {
    ChatError::Store(repository_error.to_string())
}

fn plan_choices(catalog: &[Plan]) -> String {
    catalog
        .iter()
        .map(|plan| {
            format!("{} (${:.2}/{})", plan.name, plan.price, plan.billing_cycle.as_str())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn general_query_context(subscriptions: &[Subscription], catalog: &[Plan]) -> String {
    let mut context = String::from(
        "You are a friendly subscription management assistant. Answer questions about the \
         customer's account and the available plans. Never invent prices or plans.\n\n",
    );
    context.push_str("Available plans:\n");
    for plan in catalog {
        context.push_str(&format!(
            "- {} (${}/{})\n",
            plan.name,
            plan.price,
            plan.billing_cycle.as_str()
        ));
    }
    if subscriptions.is_empty() {
        context.push_str("\nThe customer has no active subscriptions.\n");
    } else {
        context.push_str("\nThe customer's active subscriptions:\n");
        for subscription in subscriptions {
            context.push_str(&format!("- plan {}\n", subscription.plan_id));
        }
    }
    context
}
