use std::sync::Arc;

use tracing::{debug, warn};

use subchat_core::domain::plan::Plan;
use subchat_core::intent::{ActionIntent, ChatAction, ConversationTurn, TurnRole};

use crate::llm::{ChatMessage, LlmClient, LlmOutcome};
use crate::tools::{action_catalog, ToolInvocation};

const LEXICAL_CONFIDENCE: f32 = 0.8;

const RESOLVER_SYSTEM_PROMPT: &str = "You are a subscription management assistant. \
     When the customer asks for a concrete account operation, call the matching tool. \
     For anything else, answer in plain text.";

/// One fallback rule: an action, single-word triggers matched against
/// whole tokens, and multi-word triggers matched as substrings. The
/// table is ordered; the first matching rule wins and ties are never
/// re-scored.
struct FallbackRule {
    action: ChatAction,
    keywords: &'static [&'static str],
    phrases: &'static [&'static str],
}

const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule {
        action: ChatAction::ViewSubscriptions,
        keywords: &[],
        phrases: &[
            "my subscriptions",
            "my current subscriptions",
            "show subscriptions",
            "view subscriptions",
            "list subscriptions",
            "what subscriptions",
            "what am i subscribed",
            "what do i have",
        ],
    },
    FallbackRule {
        action: ChatAction::ViewBilling,
        keywords: &["billing", "invoice", "invoices", "transactions", "charges", "receipts"],
        phrases: &["payment history", "recent payments"],
    },
    FallbackRule {
        action: ChatAction::GetRecommendations,
        keywords: &["recommend", "recommendation", "recommendations", "suggest", "suggestions"],
        phrases: &["which plan", "best plan", "better plan", "save money", "what should i get"],
    },
    FallbackRule {
        action: ChatAction::CreateSubscription,
        keywords: &["subscribe", "signup", "upgrade"],
        phrases: &["sign up", "sign me up", "new subscription", "start a subscription"],
    },
    FallbackRule {
        action: ChatAction::CancelSubscription,
        keywords: &["cancel", "unsubscribe", "terminate"],
        phrases: &["stop my subscription", "end my subscription"],
    },
];

fn tokenize(message: &str) -> Vec<String> {
    message
        .split(|character: char| !character.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Deterministic lexical classification over the lowercased message.
/// Returns `None` for input no rule claims; precedence is the table
/// order, never longest-match or scoring.
pub fn lexical_resolve(message: &str, plans: &[Plan]) -> Option<ActionIntent> {
    let normalized = message.to_lowercase();
    let tokens = tokenize(&normalized);

    let rule = FALLBACK_RULES.iter().find(|rule| {
        rule.keywords.iter().any(|keyword| tokens.iter().any(|token| token == keyword))
            || rule.phrases.iter().any(|phrase| normalized.contains(phrase))
    })?;

    let mut intent = ActionIntent::new(rule.action, LEXICAL_CONFIDENCE);
    if rule.action == ChatAction::CreateSubscription {
        // Closed plan vocabulary; absence leaves plan_id unset so the
        // dispatcher can ask which plan was meant.
        if let Some(plan_id) = detect_plan_id(&tokens, plans) {
            intent = intent.with_parameter("plan_id", plan_id);
        }
    }
    Some(intent)
}

fn detect_plan_id(tokens: &[String], plans: &[Plan]) -> Option<String> {
    for plan in plans {
        let id = plan.id.0.to_lowercase();
        let name = plan.name.to_lowercase();
        if tokens.iter().any(|token| *token == id)
            || name.split_whitespace().all(|word| tokens.iter().any(|token| token == word))
        {
            return Some(plan.id.0.clone());
        }
    }
    // "basic" is a common way to ask for the entry tier.
    if tokens.iter().any(|token| token == "basic") {
        return plans
            .iter()
            .find(|plan| plan.id.0.contains("starter") || plan.name.to_lowercase().contains("starter"))
            .map(|plan| plan.id.0.clone());
    }
    None
}

/// Hybrid intent resolution: the lexical table runs first as a
/// synchronous pre-check; only unmatched input escalates to the model
/// backend. With the backend disabled or exhausted, unmatched input
/// degrades to a general query rather than failing.
pub struct IntentResolver {
    llm: Option<Arc<dyn LlmClient>>,
}

impl IntentResolver {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub async fn resolve(
        &self,
        message: &str,
        plans: &[Plan],
        history: &[ConversationTurn],
    ) -> ActionIntent {
        if let Some(intent) = lexical_resolve(message, plans) {
            debug!(
                event_name = "resolver.lexical_match",
                action = intent.action.as_str(),
                "resolved intent without model call"
            );
            return intent;
        }

        let Some(llm) = &self.llm else {
            return ActionIntent::general_query();
        };

        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            })
            .collect();
        messages.push(ChatMessage::user(message));

        match llm.chat(RESOLVER_SYSTEM_PROMPT, &messages, &action_catalog(plans)).await {
            Ok(LlmOutcome::ToolCall { name, arguments }) => {
                ToolInvocation::parse(&name, &arguments).into_intent()
            }
            // Free text means the model saw no actionable request.
            Ok(LlmOutcome::Text(_)) => ActionIntent::general_query(),
            Err(error) => {
                warn!(
                    event_name = "resolver.backend_unavailable",
                    error = %error,
                    "intent resolution degrading to general query"
                );
                ActionIntent::general_query()
            }
        }
    }
}
