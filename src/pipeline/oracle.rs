//! Section-boundary oracle: ask the model which trailing section of a chunk
//! was cut off by the chunk boundary.
//!
//! One remote call per chunk, never retried. Any failure degrades to "no
//! incomplete section", which simply leaves that boundary where the naive
//! split put it.

use crate::config::PaperConfig;
use crate::pipeline::client::{CallKind, CompletionClient, CompletionParams};
use crate::prompts::{boundary_prompt, NO_INCOMPLETE_SECTION};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Headings are short; a long answer means the model ignored the format.
const ORACLE_MAX_TOKENS: usize = 256;

pub struct SectionOracle {
    client: Arc<dyn CompletionClient>,
    params: CompletionParams,
}

impl SectionOracle {
    pub fn new(client: Arc<dyn CompletionClient>, config: &PaperConfig) -> Self {
        Self {
            client,
            params: CompletionParams {
                kind: CallKind::BoundaryCheck,
                temperature: config.temperature,
                max_tokens: ORACLE_MAX_TOKENS,
                timeout: Duration::from_secs(config.oracle_timeout_secs),
            },
        }
    }

    /// Name the last truncated section of `chunk`, verbatim as the model
    /// transcribed it, or `None`.
    ///
    /// `index` is the 0-based chunk position, used for logging only.
    pub async fn find_last_incomplete_section(&self, chunk: &str, index: usize) -> Option<String> {
        let prompt = boundary_prompt(chunk);
        match self.client.complete(&prompt, &self.params).await {
            Ok(reply) => parse_reply(&reply),
            Err(e) => {
                warn!(
                    "Chunk {}: boundary check failed, treating as complete: {}",
                    index + 1,
                    e
                );
                None
            }
        }
    }
}

/// Interpret the oracle's reply. Only surrounding whitespace is removed;
/// the heading itself is never altered.
fn parse_reply(reply: &str) -> Option<String> {
    let answer = reply.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case(NO_INCOMPLETE_SECTION) {
        None
    } else {
        Some(answer.to_string())
    }
}
