//! The fixed catalog of actions offered to the model backend, and the
//! boundary validation of whatever the backend sends back.

use serde_json::{json, Value};

use subchat_core::domain::plan::Plan;
use subchat_core::intent::{ActionIntent, ChatAction};

use crate::llm::ToolSpec;

/// Exactly five invocable actions. `general_query` is deliberately not
/// in the catalog: free text from the model already means "no action".
pub fn action_catalog(plans: &[Plan]) -> Vec<ToolSpec> {
    let plan_ids: Vec<&str> = plans.iter().map(|plan| plan.id.0.as_str()).collect();

    vec![
        ToolSpec {
            name: "view_subscriptions",
            description: "List the customer's current subscriptions",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "view_billing",
            description: "Show the customer's recent billing transactions",
            parameters: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "How many transactions to show (default 10)"
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_recommendations",
            description: "Recommend plans based on the customer's usage and spend",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "create_subscription",
            description: "Subscribe the customer to a plan",
            parameters: json!({
                "type": "object",
                "properties": {
                    "plan_id": { "type": "string", "enum": plan_ids }
                },
                "required": ["plan_id"]
            }),
        },
        ToolSpec {
            name: "cancel_subscription",
            description: "Cancel one of the customer's subscriptions",
            parameters: json!({
                "type": "object",
                "properties": {
                    "subscription_id": { "type": "string" }
                },
                "required": ["subscription_id"]
            }),
        },
    ]
}

/// Model tool-call payloads validated into a closed set of variants.
/// Anything that fails name lookup, JSON parsing, or a required-argument
/// check lands in `Unrecognized` and degrades to a general query instead
/// of erroring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolInvocation {
    ViewSubscriptions,
    ViewBilling { limit: Option<u64> },
    GetRecommendations,
    CreateSubscription { plan_id: String },
    CancelSubscription { subscription_id: String },
    Unrecognized,
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &str) -> Self {
        let Ok(payload) = serde_json::from_str::<Value>(if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        }) else {
            return Self::Unrecognized;
        };
        if !payload.is_object() {
            return Self::Unrecognized;
        }

        match name {
            "view_subscriptions" => Self::ViewSubscriptions,
            "view_billing" => Self::ViewBilling { limit: payload["limit"].as_u64() },
            "get_recommendations" => Self::GetRecommendations,
            "create_subscription" => match payload["plan_id"].as_str() {
                Some(plan_id) if !plan_id.is_empty() => {
                    Self::CreateSubscription { plan_id: plan_id.to_string() }
                }
                _ => Self::Unrecognized,
            },
            "cancel_subscription" => match payload["subscription_id"].as_str() {
                Some(subscription_id) if !subscription_id.is_empty() => {
                    Self::CancelSubscription { subscription_id: subscription_id.to_string() }
                }
                _ => Self::Unrecognized,
            },
            _ => Self::Unrecognized,
        }
    }

    /// Model-resolved intents carry confidence 0.9; unrecognized payloads
    /// degrade to a general query at 0.5.
    pub fn into_intent(self) -> ActionIntent {
        const MODEL_CONFIDENCE: f32 = 0.9;
        match self {
            Self::ViewSubscriptions => {
                ActionIntent::new(ChatAction::ViewSubscriptions, MODEL_CONFIDENCE)
            }
            Self::ViewBilling { limit } => {
                let intent = ActionIntent::new(ChatAction::ViewBilling, MODEL_CONFIDENCE);
                match limit {
                    Some(limit) => intent.with_parameter("limit", limit),
                    None => intent,
                }
            }
            Self::GetRecommendations => {
                ActionIntent::new(ChatAction::GetRecommendations, MODEL_CONFIDENCE)
            }
            Self::CreateSubscription { plan_id } => {
                ActionIntent::new(ChatAction::CreateSubscription, MODEL_CONFIDENCE)
                    .with_parameter("plan_id", plan_id)
            }
            Self::CancelSubscription { subscription_id } => {
                ActionIntent::new(ChatAction::CancelSubscription, MODEL_CONFIDENCE)
                    .with_parameter("subscription_id", subscription_id)
            }
            Self::Unrecognized => ActionIntent::general_query(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use subchat_core::domain::plan::{BillingCycle, Plan, PlanId};
    use subchat_core::intent::ChatAction;

    use super::{action_catalog, ToolInvocation};

    fn catalog_plans() -> Vec<Plan> {
        vec![
            Plan {
                id: PlanId("starter".to_string()),
                name: "Starter".to_string(),
                price: Decimal::new(999, 2),
                billing_cycle: BillingCycle::Monthly,
            },
            Plan {
                id: PlanId("premium".to_string()),
                name: "Premium".to_string(),
                price: Decimal::new(2999, 2),
                billing_cycle: BillingCycle::Monthly,
            },
        ]
    }

    #[test]
    fn catalog_offers_exactly_five_actions() {
        let tools = action_catalog(&catalog_plans());
        let names: Vec<&str> = tools.iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            vec![
                "view_subscriptions",
                "view_billing",
                "get_recommendations",
                "create_subscription",
                "cancel_subscription"
            ]
        );
    }

    #[test]
    fn create_subscription_schema_enumerates_plan_ids() {
        let tools = action_catalog(&catalog_plans());
        let create = tools
            .iter()
            .find(|tool| tool.name == "create_subscription")
            .expect("create tool present");
        let ids = create.parameters["properties"]["plan_id"]["enum"]
            .as_array()
            .expect("enum array");
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "starter");
    }

    #[test]
    fn valid_payloads_parse_into_typed_variants() {
        assert_eq!(
            ToolInvocation::parse("view_billing", r#"{"limit": 5}"#),
            ToolInvocation::ViewBilling { limit: Some(5) }
        );
        assert_eq!(
            ToolInvocation::parse("create_subscription", r#"{"plan_id":"premium"}"#),
            ToolInvocation::CreateSubscription { plan_id: "premium".to_string() }
        );
        assert_eq!(
            ToolInvocation::parse("view_subscriptions", ""),
            ToolInvocation::ViewSubscriptions
        );
    }

    #[test]
    fn missing_required_arguments_degrade_to_unrecognized() {
        assert_eq!(
            ToolInvocation::parse("create_subscription", "{}"),
            ToolInvocation::Unrecognized
        );
        assert_eq!(
            ToolInvocation::parse("cancel_subscription", r#"{"subscription_id":""}"#),
            ToolInvocation::Unrecognized
        );
    }

    #[test]
    fn malformed_json_and_unknown_tools_degrade_to_general_query() {
        let from_bad_json = ToolInvocation::parse("view_billing", "{not json").into_intent();
        assert_eq!(from_bad_json.action, ChatAction::GeneralQuery);
        assert_eq!(from_bad_json.confidence, 0.5);

        let from_unknown = ToolInvocation::parse("delete_account", "{}").into_intent();
        assert_eq!(from_unknown.action, ChatAction::GeneralQuery);
    }
}
