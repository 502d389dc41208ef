//! Chat runtime - intent resolution and action execution
//!
//! This crate is the "brain" of the subscription assistant:
//! - Resolves natural-language messages into one of a fixed set of
//!   domain actions (`resolver`), lexical rules first, model escalation
//!   only for unmatched input
//! - Executes the resolved action against the store (`dispatcher`)
//! - Synthesizes plan recommendations from usage data (`analyzer`)
//!
//! # Safety principle
//!
//! The language model is strictly a translator and a narrator. It NEVER
//! decides which subscriptions exist, what anything costs, or how much a
//! plan change saves. Those are deterministic decisions made by the core
//! arithmetic; any number the model emits is discarded and recomputed.

pub mod analyzer;
pub mod dispatcher;
pub mod llm;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod tools;

pub use analyzer::RecommendationAnalyzer;
pub use dispatcher::{ChatReply, Dispatcher};
pub use llm::{ChatMessage, LlmClient, LlmError, LlmOutcome, OpenAiClient, ToolSpec};
pub use resolver::IntentResolver;
pub use retry::RetryPolicy;
pub use service::{ChatRequest, ChatService};

#[cfg(test)]
pub(crate) mod testing;
