//! Chunk annotation: send each finalized chunk to the model with the
//! explanation prompt and collect the LaTeX it returns.
//!
//! ## Retry Strategy
//!
//! Every failure cause (provider error, timeout, empty reply) is retried the
//! same way, up to `max_attempts` calls in total. The delay before attempt
//! *n* is `retry_backoff_ms · 2^(n-2)` capped at `retry_backoff_max_ms`;
//! with the defaults that is 4 s then 8 s.
//!
//! A chunk that still fails is returned as a [`ChunkResult`] carrying a
//! [`ChunkError`] and is left out of the assembled document. Only the caller
//! decides whether "all failed" is fatal.

use crate::config::PaperConfig;
use crate::error::{ChunkError, LlmError};
use crate::output::ChunkResult;
use crate::pipeline::client::{CallKind, CompletionClient, CompletionParams};
use crate::prompts::annotation_prompt;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Annotate one chunk. `index` is 0-based; `total` is the finalized chunk count.
///
/// Never returns an error: failures are recorded in `ChunkResult::error`.
pub async fn annotate_chunk(
    client: &Arc<dyn CompletionClient>,
    chunk: &str,
    index: usize,
    total: usize,
    config: &PaperConfig,
) -> ChunkResult {
    let start = Instant::now();
    let chunk_num = index + 1;
    let body = chunk.trim();

    if body.is_empty() {
        warn!("Chunk {}/{}: empty after trimming, skipped", chunk_num, total);
        return ChunkResult {
            index,
            source_chars: 0,
            markup: String::new(),
            attempts: 0,
            duration_ms: 0,
            error: Some(ChunkError::EmptyChunk { chunk: chunk_num }),
        };
    }

    let prompt = annotation_prompt(
        config.annotation_prompt.as_deref(),
        &config.language,
        body,
        index,
        total,
    );
    let params = build_params(config);
    let mut last_err: Option<LlmError> = None;

    for attempt in 1..=config.max_attempts {
        let backoff = config.backoff_before(attempt);
        if !backoff.is_zero() {
            warn!(
                "Chunk {}/{}: attempt {}/{} after {}ms",
                chunk_num,
                total,
                attempt,
                config.max_attempts,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let outcome = client
            .complete(&prompt, &params)
            .await
            .and_then(|reply| {
                if reply.trim().is_empty() {
                    Err(LlmError::EmptyResponse)
                } else {
                    Ok(reply)
                }
            });

        match outcome {
            Ok(markup) => {
                let duration = start.elapsed();
                debug!(
                    "Chunk {}/{}: {} bytes of markup in {:?}",
                    chunk_num,
                    total,
                    markup.len(),
                    duration
                );
                return ChunkResult {
                    index,
                    source_chars: body.chars().count(),
                    markup,
                    attempts: attempt,
                    duration_ms: duration.as_millis() as u64,
                    error: None,
                };
            }
            Err(e) => {
                warn!("Chunk {}/{}: attempt {} failed: {}", chunk_num, total, attempt, e);
                last_err = Some(e);
            }
        }
    }

    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());

    ChunkResult {
        index,
        source_chars: body.chars().count(),
        markup: String::new(),
        attempts: config.max_attempts,
        duration_ms: start.elapsed().as_millis() as u64,
        error: Some(ChunkError::AnnotationFailed {
            chunk: chunk_num,
            attempts: config.max_attempts,
            detail,
        }),
    }
}

/// Annotate every finalized chunk with at most `annotation_concurrency`
/// calls in flight. Results come back in chunk order.
pub async fn annotate_all(
    client: &Arc<dyn CompletionClient>,
    chunks: &[String],
    config: &PaperConfig,
) -> Vec<ChunkResult> {
    let total = chunks.len();

    stream::iter(chunks.iter().enumerate().map(|(index, chunk)| {
        let client = Arc::clone(client);
        async move {
            let chunk_num = index + 1;
            info!("Annotating chunk {}/{}", chunk_num, total);
            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_start(chunk_num, total);
            }
            let result = annotate_chunk(&client, chunk, index, total, config).await;
            if let Some(ref cb) = config.progress_callback {
                match &result.error {
                    None => cb.on_chunk_complete(chunk_num, total, result.markup.len()),
                    Some(e) => cb.on_chunk_error(chunk_num, total, &e.to_string()),
                }
            }
            info!(
                "Annotation progress: {}%",
                (chunk_num * 100) / total.max(1)
            );
            result
        }
    }))
    .buffered(config.annotation_concurrency.max(1))
    .collect()
    .await
}

fn build_params(config: &PaperConfig) -> CompletionParams {
    CompletionParams {
        kind: CallKind::Annotation,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(config.api_timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::client::testing::ScriptedClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> PaperConfig {
        PaperConfig::builder()
            .retry_backoff_ms(1)
            .retry_backoff_max_ms(2)
            .build()
            .unwrap()
    }

    fn as_dyn(client: &Arc<ScriptedClient>) -> Arc<dyn CompletionClient> {
        client.clone()
    }

    #[test]
    fn build_params_defaults() {
        let params = build_params(&PaperConfig::default());
        assert_eq!(params.kind, CallKind::Annotation);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(LlmError::Provider("connection reset".into())),
            Err(LlmError::Timeout { secs: 300 }),
            Ok("\\section*{1 Intro} explained".into()),
        ]));

        let result = annotate_chunk(&as_dyn(&client), "1 Intro text", 0, 1, &fast_config()).await;

        assert!(result.is_ok());
        assert_eq!(result.attempts, 3);
        assert_eq!(result.markup, "\\section*{1 Intro} explained");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("   ".into()),
            Ok("done".into()),
        ]));

        let result = annotate_chunk(&as_dyn(&client), "text", 0, 1, &fast_config()).await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.markup, "done");
    }

    #[tokio::test]
    async fn exhausted_attempts_record_error() {
        let client = Arc::new(ScriptedClient::new(vec![]));

        let result = annotate_chunk(&as_dyn(&client), "text", 4, 6, &fast_config()).await;

        assert_eq!(client.calls(), 3);
        assert!(result.markup.is_empty());
        match result.error {
            Some(ChunkError::AnnotationFailed { chunk, attempts, .. }) => {
                assert_eq!(chunk, 5);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_chunk_is_not_sent() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("x".into())]));

        let result = annotate_chunk(&as_dyn(&client), " \n\t ", 0, 1, &fast_config()).await;

        assert_eq!(client.calls(), 0);
        assert!(matches!(result.error, Some(ChunkError::EmptyChunk { chunk: 1 })));
    }

    #[tokio::test]
    async fn prompt_contains_trimmed_chunk() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("ok".into())]));

        annotate_chunk(&as_dyn(&client), "\n  2 Method body  \n", 1, 3, &fast_config()).await;

        let prompt = &client.prompts()[0];
        assert!(prompt.ends_with("2 Method body"));
        assert!(prompt.contains("part 2 of 3"));
    }

    #[tokio::test]
    async fn annotate_all_keeps_chunk_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("first".into()),
            Ok("second".into()),
            Ok("third".into()),
        ]));
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let results = annotate_all(&as_dyn(&client), &chunks, &fast_config()).await;

        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(results[0].markup, "first");
        assert_eq!(results[2].markup, "third");
    }

    /// Replies after a delay picked from the chunk text, so later chunks
    /// finish first when several calls are in flight.
    struct SlowFirstClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for SlowFirstClient {
        async fn complete(&self, prompt: &str, _params: &CompletionParams) -> Result<String, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let (tag, delay) = if prompt.ends_with("chunk-a") {
                ("a", 80)
            } else if prompt.ends_with("chunk-b") {
                ("b", 40)
            } else {
                ("c", 1)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("out-{tag}"))
        }
    }

    #[tokio::test]
    async fn concurrent_annotation_returns_results_in_chunk_order() {
        let client = Arc::new(SlowFirstClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dyn_client: Arc<dyn CompletionClient> = client.clone();
        let config = PaperConfig::builder()
            .annotation_concurrency(3)
            .retry_backoff_ms(1)
            .retry_backoff_max_ms(2)
            .build()
            .unwrap();
        let chunks: Vec<String> = ["chunk-a", "chunk-b", "chunk-c"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let results = annotate_all(&dyn_client, &chunks, &config).await;

        let markups: Vec<&str> = results.iter().map(|r| r.markup.as_str()).collect();
        assert_eq!(markups, vec!["out-a", "out-b", "out-c"]);
        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(client.peak.load(Ordering::SeqCst) > 1);
    }
}
