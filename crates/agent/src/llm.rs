use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use subchat_core::config::LlmConfig;

use crate::retry::RetryPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

/// One invocable action offered to the model, with a JSON-schema
/// parameter declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What the backend came back with: free text (no action intended) or
/// exactly one structured invocation. Backends that return several
/// invocations are truncated to the first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmOutcome {
    Text(String),
    ToolCall { name: String, arguments: String },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("malformed backend payload: {0}")]
    Malformed(String),
    #[error("backend retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmOutcome, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
/// (hosted APIs and local runtimes alike). Model identifier and
/// endpoint come from config; each call carries a timeout and the
/// bounded retry policy.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    fn request_body(&self, system: &str, messages: &[ChatMessage], tools: &[ToolSpec]) -> Value {
        let mut wire_messages = vec![json!({ "role": "system", "content": system })];
        wire_messages.extend(
            messages
                .iter()
                .map(|message| json!({ "role": message.role, "content": message.content })),
        );

        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.parameters,
                            }
                        })
                    })
                    .collect(),
            );
            body["tool_choice"] = json!("auto");
        }
        body
    }

    async fn send_once(&self, body: &Value) -> Result<LlmOutcome, LlmError> {
        let mut request = self.http.post(format!("{}/chat/completions", self.base_url));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Malformed(error.to_string()))?;
        outcome_from_response(payload)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmOutcome, LlmError> {
        let body = self.request_body(system, messages, tools);

        for attempt in 1..=self.retry.max_attempts {
            match self.send_once(&body).await {
                Ok(outcome) => return Ok(outcome),
                // Malformed payloads will not improve on retry; surface
                // them so the caller can degrade.
                Err(error @ LlmError::Malformed(_)) => return Err(error),
                Err(error) => {
                    warn!(
                        event_name = "llm.request.retry",
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %error,
                        "model backend call failed"
                    );
                    if let Some(delay) = self.retry.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted { attempts: self.retry.max_attempts })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionPayload {
    name: String,
    arguments: String,
}

fn outcome_from_response(response: ChatCompletionResponse) -> Result<LlmOutcome, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("response carried no choices".to_string()))?;

    // Only the first invocation is honored.
    if let Some(tool_call) = choice.message.tool_calls.into_iter().next() {
        return Ok(LlmOutcome::ToolCall {
            name: tool_call.function.name,
            arguments: tool_call.function.arguments,
        });
    }

    match choice.message.content {
        Some(content) => Ok(LlmOutcome::Text(content)),
        None => Err(LlmError::Malformed("choice had neither content nor tool calls".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{outcome_from_response, ChatCompletionResponse, LlmError, LlmOutcome};

    fn parse(raw: &str) -> ChatCompletionResponse {
        serde_json::from_str(raw).expect("test payload should deserialize")
    }

    #[test]
    fn plain_text_reply_is_text_outcome() {
        let response = parse(
            r#"{"choices":[{"message":{"content":"Happy to help with your plans."}}]}"#,
        );
        assert_eq!(
            outcome_from_response(response).unwrap(),
            LlmOutcome::Text("Happy to help with your plans.".to_string())
        );
    }

    #[test]
    fn only_the_first_tool_call_is_honored() {
        let response = parse(
            r#"{"choices":[{"message":{
                "content":null,
                "tool_calls":[
                    {"function":{"name":"view_subscriptions","arguments":"{}"}},
                    {"function":{"name":"cancel_subscription","arguments":"{}"}}
                ]}}]}"#,
        );
        match outcome_from_response(response).unwrap() {
            LlmOutcome::ToolCall { name, .. } => assert_eq!(name, "view_subscriptions"),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn tool_call_wins_over_text_when_both_are_present() {
        let response = parse(
            r#"{"choices":[{"message":{
                "content":"calling a tool",
                "tool_calls":[{"function":{"name":"view_billing","arguments":"{\"limit\":5}"}}]
            }}]}"#,
        );
        assert!(matches!(
            outcome_from_response(response).unwrap(),
            LlmOutcome::ToolCall { .. }
        ));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let response = parse(r#"{"choices":[]}"#);
        assert!(matches!(outcome_from_response(response), Err(LlmError::Malformed(_))));
    }
}
