//! Remote completion seam shared by the boundary oracle and the annotator.
//!
//! Both stages only need "send one prompt, get text back". Hiding the
//! provider behind [`CompletionClient`] keeps the rebalancing and annotation
//! algorithms testable with a deterministic stub that returns scripted
//! responses, while production runs go through [`ProviderClient`] and any
//! provider `edgequake-llm` supports.

use crate::error::LlmError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which pipeline stage issued a completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// "Which trailing section of this chunk is truncated?"
    BoundaryCheck,
    /// "Explain this chunk."
    Annotation,
}

/// Parameters for a single completion call.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub kind: CallKind,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

/// A remote text-completion service.
///
/// Implementations must enforce `params.timeout` themselves and report
/// expiry as [`LlmError::Timeout`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String, LlmError>;
}

/// [`CompletionClient`] backed by an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionClient for ProviderClient {
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String, LlmError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            params.timeout,
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| LlmError::Timeout {
            secs: params.timeout.as_secs(),
        })?
        .map_err(|e| LlmError::Provider(e.to_string()))?;

        debug!(
            "{:?}: {} input tokens, {} output tokens",
            params.kind, response.prompt_tokens, response.completion_tokens
        );

        Ok(response.content)
    }
}
