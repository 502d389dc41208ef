//! Plan recommendations from subscription and billing data.
//!
//! The model backend contributes candidate plan identities, reasoning
//! prose and benefit bullets. Every number is recomputed here from the
//! catalog; model-provided savings figures are discarded on arrival.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use subchat_core::domain::billing::{BillingRecord, BillingStatus};
use subchat_core::domain::customer::CustomerId;
use subchat_core::domain::plan::Plan;
use subchat_core::domain::subscription::SubscriptionStatus;
use subchat_core::errors::ChatError;
use subchat_core::recommend::{
    build_recommendation, consolidation_recommendation, current_monthly_total,
    starter_recommendation, Recommendation,
};

use subchat_db::repositories::{BillingRepository, PlanRepository, SubscriptionRepository};

use crate::llm::{ChatMessage, LlmClient, LlmOutcome};

const BILLING_CONTEXT_LIMIT: u32 = 10;
const MAX_MODEL_CANDIDATES: usize = 2;

const ANALYZER_SYSTEM_PROMPT: &str = "You are a subscription plan analyst. Reply with a JSON \
     array of one or two objects, each shaped as {\"plan_id\": string, \"reasoning\": string, \
     \"benefits\": [string]}. Recommend only plans from the provided catalog. Reply with the \
     JSON array alone.";

pub struct RecommendationAnalyzer {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    billing: Arc<dyn BillingRepository>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl RecommendationAnalyzer {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        billing: Arc<dyn BillingRepository>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self { plans, subscriptions, billing, llm }
    }

    pub async fn analyze(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Recommendation>, ChatError> {
        let active = self
            .subscriptions
            .list_by_customer(customer_id, Some(SubscriptionStatus::Active))
            .await
            .map_err(store_error)?;
        let catalog = self.plans.list().await.map_err(store_error)?;

        // No usage data to reason over: one canned starter entry, and no
        // backend round-trip.
        if active.is_empty() {
            return Ok(starter_recommendation(&catalog).into_iter().collect());
        }

        let active_plans: Vec<Plan> = active
            .iter()
            .filter_map(|subscription| {
                catalog.iter().find(|plan| plan.id == subscription.plan_id).cloned()
            })
            .collect();
        let recent_payments = self
            .billing
            .list_by_customer(customer_id, Some(BillingStatus::Paid), BILLING_CONTEXT_LIMIT)
            .await
            .map_err(store_error)?;
        let current_monthly = current_monthly_total(&active_plans);

        let mut recommendations = Vec::new();

        if let Some(llm) = &self.llm {
            let summary = usage_summary(&active_plans, &recent_payments, &catalog);
            match llm.chat(ANALYZER_SYSTEM_PROMPT, &[ChatMessage::user(summary)], &[]).await {
                Ok(LlmOutcome::Text(text)) => {
                    for candidate in parse_candidates(&text).into_iter().take(MAX_MODEL_CANDIDATES)
                    {
                        let Some(plan) =
                            catalog.iter().find(|plan| plan.id.0 == candidate.plan_id)
                        else {
                            debug!(
                                event_name = "analyzer.unknown_candidate_plan",
                                plan_id = %candidate.plan_id,
                                "dropping candidate that cannot be priced"
                            );
                            continue;
                        };
                        recommendations.push(build_recommendation(
                            plan,
                            current_monthly,
                            candidate.reasoning,
                            candidate.benefits,
                        ));
                    }
                }
                // The narrative call offers no tools; an invocation here
                // is a backend quirk we simply ignore.
                Ok(LlmOutcome::ToolCall { .. }) => {}
                Err(llm_error) => {
                    error!(
                        event_name = "analyzer.backend_unavailable",
                        error = %llm_error,
                        "recommendation narrative call failed"
                    );
                    return Err(ChatError::BackendUnavailable(llm_error.to_string()));
                }
            }
        }

        if let Some(consolidation) = consolidation_recommendation(&active_plans, &catalog) {
            recommendations.push(consolidation);
        }

        Ok(recommendations)
    }
}

fn store_error(error: subchat_db::repositories::RepositoryError) -> ChatError {
    error!(
        event_name = "analyzer.store_failure",
        error = %error,
        "repository call failed during analysis"
    );
    ChatError::Store(error.to_string())
}

fn usage_summary(
    active_plans: &[Plan],
    recent_payments: &[BillingRecord],
    catalog: &[Plan],
) -> String {
    let mut summary = String::from("Current subscriptions:\n");
    for plan in active_plans {
        summary.push_str(&format!(
            "- {} (${}/{})\n",
            plan.name,
            plan.price,
            plan.billing_cycle.as_str()
        ));
    }
    summary.push_str(&format!(
        "Successful payments in scope: {} totalling ${}.\n",
        recent_payments.len(),
        recent_payments.iter().map(|record| record.amount).sum::<rust_decimal::Decimal>(),
    ));
    summary.push_str("Catalog:\n");
    for plan in catalog {
        summary.push_str(&format!(
            "- {} (id: {}, ${}/{})\n",
            plan.name,
            plan.id,
            plan.price,
            plan.billing_cycle.as_str()
        ));
    }
    summary
}

#[derive(Debug, Deserialize)]
struct CandidatePayload {
    #[serde(alias = "planId")]
    plan_id: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    benefits: Vec<String>,
    // Deliberately parsed and dropped: the model is not the source of
    // numeric truth.
    #[serde(default, alias = "potentialSavings")]
    #[allow(dead_code)]
    potential_savings: Option<Value>,
}

/// Lenient extraction of a JSON array from model prose. Anything that
/// fails to parse yields an empty candidate list instead of an error.
fn parse_candidates(text: &str) -> Vec<CandidatePayload> {
    let start = text.find('[');
    let end = text.rfind(']');
    let Some((start, end)) = start.zip(end).filter(|(start, end)| start < end) else {
        debug!(event_name = "analyzer.no_candidate_array", "model reply carried no JSON array");
        return Vec::new();
    };

    match serde_json::from_str(&text[start..=end]) {
        Ok(candidates) => candidates,
        Err(parse_error) => {
            debug!(
                event_name = "analyzer.malformed_candidates",
                error = %parse_error,
                "tolerating malformed model output"
            );
            Vec::new()
        }
    }
}
