//! Shared test doubles for the model backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient, LlmError, LlmOutcome, ToolSpec};

#[derive(Clone)]
enum Behavior {
    Outcome(LlmOutcome),
    Fail,
}

/// Scripted backend: always returns the configured outcome (or failure)
/// and counts how often it was reached.
#[derive(Clone)]
pub struct StubLlm {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl StubLlm {
    pub fn with_outcome(outcome: LlmOutcome) -> Self {
        Self { behavior: Behavior::Outcome(outcome), calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn with_text(text: &str) -> Self {
        Self::with_outcome(LlmOutcome::Text(text.to_string()))
    }

    pub fn failing() -> Self {
        Self { behavior: Behavior::Fail, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn client(&self) -> Arc<dyn LlmClient> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn chat(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<LlmOutcome, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Outcome(outcome) => Ok(outcome.clone()),
            Behavior::Fail => Err(LlmError::RetriesExhausted { attempts: 3 }),
        }
    }
}
