use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of actions the assistant can take on behalf of a
/// customer. `GeneralQuery` is the catch-all for anything that does not
/// map onto a domain operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    ViewSubscriptions,
    ViewBilling,
    GetRecommendations,
    CreateSubscription,
    CancelSubscription,
    GeneralQuery,
}

impl ChatAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewSubscriptions => "view_subscriptions",
            Self::ViewBilling => "view_billing",
            Self::GetRecommendations => "get_recommendations",
            Self::CreateSubscription => "create_subscription",
            Self::CancelSubscription => "cancel_subscription",
            Self::GeneralQuery => "general_query",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view_subscriptions" => Some(Self::ViewSubscriptions),
            "view_billing" => Some(Self::ViewBilling),
            "get_recommendations" => Some(Self::GetRecommendations),
            "create_subscription" => Some(Self::CreateSubscription),
            "cancel_subscription" => Some(Self::CancelSubscription),
            "general_query" => Some(Self::GeneralQuery),
            _ => None,
        }
    }
}

/// One resolved intent per inbound message. Confidence is advisory
/// only; it never gates execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionIntent {
    pub action: ChatAction,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub confidence: f32,
}

impl ActionIntent {
    pub fn new(action: ChatAction, confidence: f32) -> Self {
        Self { action, parameters: Map::new(), confidence }
    }

    pub fn general_query() -> Self {
        Self::new(ChatAction::GeneralQuery, 0.5)
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn parameter_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A prior turn supplied by the caller. The core never persists
/// conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::{ActionIntent, ChatAction};

    #[test]
    fn action_round_trips_through_str() {
        for action in [
            ChatAction::ViewSubscriptions,
            ChatAction::ViewBilling,
            ChatAction::GetRecommendations,
            ChatAction::CreateSubscription,
            ChatAction::CancelSubscription,
            ChatAction::GeneralQuery,
        ] {
            assert_eq!(ChatAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(ChatAction::parse("delete_everything"), None);
    }

    #[test]
    fn parameters_are_typed_accessors() {
        let intent = ActionIntent::new(ChatAction::ViewBilling, 0.8)
            .with_parameter("limit", 5)
            .with_parameter("plan_id", "premium");

        assert_eq!(intent.parameter_u64("limit"), Some(5));
        assert_eq!(intent.parameter_str("plan_id"), Some("premium"));
        assert_eq!(intent.parameter_str("missing"), None);
    }
}
