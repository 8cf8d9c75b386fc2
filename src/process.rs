//! End-to-end entry points: PDF (or already-extracted text) in, annotated
//! LaTeX, light markup and optionally a compiled PDF out.
//!
//! Every run gets its own [`RunLog`]; the whole pipeline future executes
//! under that log's dispatcher and inside a `paper` span, so records from
//! two papers processed concurrently never mix.

use crate::config::PaperConfig;
use crate::error::PaperError;
use crate::logging::{file_timestamp, RunLog};
use crate::output::{ChunkResult, PaperOutput, PaperStats};
use crate::pipeline::annotate::annotate_all;
use crate::pipeline::assemble::assemble;
use crate::pipeline::chunk::{merge_small, split};
use crate::pipeline::client::{CompletionClient, ProviderClient};
use crate::pipeline::compile::{compile, CompileJob};
use crate::pipeline::extract::{strip_references, PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{self, file_prefix};
use crate::pipeline::markdown::to_light_markup;
use crate::pipeline::oracle::SectionOracle;
use crate::pipeline::rebalance::rebalance;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, info_span, warn, Instrument};

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Annotate a PDF given as a local path or HTTP(S) URL.
///
/// # Returns
/// `Ok(PaperOutput)` once the `.tex` and `.md` artifacts are written, even if
/// some chunks failed (see `output.stats.failed_chunks`) or compilation
/// failed (`output.pdf_path` is `None`).
///
/// # Errors
/// Fatal conditions only: unreadable input, no extractable text, too many
/// chunks, no chunks, every chunk failed, artifacts not writable.
///
/// # Example
/// ```rust,no_run
/// use edgequake_paper2tex::{process_pdf, PaperConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PaperConfig::builder().language("English").build()?;
/// let output = process_pdf("transformer-xl.pdf", &config).await?;
/// println!("{}", output.tex_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn process_pdf(
    input_str: impl AsRef<str>,
    config: &PaperConfig,
) -> Result<PaperOutput, PaperError> {
    config.validate()?;
    let input_str = input_str.as_ref();
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let file_name = resolved.file_name();
    let pdf_path = resolved.path().to_path_buf();

    let run_log = RunLog::open(&config.logs_dir, &file_name, &config.console_log_filter)?;
    let span = tracing::dispatcher::with_default(run_log.dispatch(), || {
        info_span!("paper", file = %file_name)
    });

    async {
        info!("Processing {}", input_str);
        info!("Process log: {}", run_log.path().display());
        let text = extract_text(&pdf_path, config).await?;
        run_pipeline(&text, &file_name, &pdf_path, config).await
    }
    .instrument(span)
    .with_subscriber(run_log.dispatch().clone())
    .await
}

/// Annotate text that has already been extracted.
///
/// `source_name` stands in for the input file name: it keys the log files
/// and its first 12 characters (extension stripped) prefix the artifacts.
/// Everything from the references heading onward is still removed.
pub async fn process_text(
    text: &str,
    source_name: &str,
    config: &PaperConfig,
) -> Result<PaperOutput, PaperError> {
    config.validate()?;
    let run_log = RunLog::open(&config.logs_dir, source_name, &config.console_log_filter)?;
    let span = tracing::dispatcher::with_default(run_log.dispatch(), || {
        info_span!("paper", file = %source_name)
    });

    async {
        info!("Processing {} ({} chars of text)", source_name, text.len());
        run_pipeline(text, source_name, Path::new(source_name), config).await
    }
    .instrument(span)
    .with_subscriber(run_log.dispatch().clone())
    .await
}

/// Synchronous wrapper around [`process_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_pdf_sync(
    input_str: impl AsRef<str>,
    config: &PaperConfig,
) -> Result<PaperOutput, PaperError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PaperError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_pdf(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_text(pdf_path: &Path, config: &PaperConfig) -> Result<String, PaperError> {
    let extractor: Arc<dyn TextExtractor> = match config.extractor {
        Some(ref e) => Arc::clone(e),
        None => Arc::new(PdfiumExtractor),
    };
    let path = pdf_path.to_path_buf();
    let password = config.password.clone();
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());

    let start = Instant::now();
    let text = tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            extractor.extract(&path, password.as_deref())
        })
    })
    .await
    .map_err(|e| PaperError::Internal(format!("Extraction task panicked: {}", e)))??;

    info!(
        "Extracted {} chars in {}ms",
        text.chars().count(),
        start.elapsed().as_millis()
    );
    Ok(text)
}

async fn run_pipeline(
    raw_text: &str,
    file_name: &str,
    source_path: &Path,
    config: &PaperConfig,
) -> Result<PaperOutput, PaperError> {
    let total_start = Instant::now();

    // ── Step 1: Drop the bibliography ────────────────────────────────────
    let text = strip_references(raw_text, &config.references_heading);
    if text.trim().is_empty() {
        return Err(PaperError::ExtractionFailed {
            path: source_path.to_path_buf(),
        });
    }
    let extracted_chars = text.chars().count();

    // ── Step 2: Initial split ────────────────────────────────────────────
    let mut chunks = split(text, config.chunk_size);
    let initial_chunks = chunks.len();
    info!("Split into {} chunks of up to {} chars", initial_chunks, config.chunk_size);

    if initial_chunks > config.max_chunks {
        return Err(PaperError::DocumentTooLong {
            chunks: initial_chunks,
            max: config.max_chunks,
        });
    }
    if initial_chunks == 0 {
        return Err(PaperError::NoContent);
    }

    // ── Step 3: Resolve the model client ─────────────────────────────────
    let client = resolve_client(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(initial_chunks);
    }

    // ── Step 4: Rebalance boundaries ─────────────────────────────────────
    let oracle = SectionOracle::new(Arc::clone(&client), config);
    let report = rebalance(&mut chunks, &oracle, config.progress_callback.as_ref()).await;
    info!(
        "Rebalancing done: {} of {} boundaries moved, {} unresolved",
        report.relocations.len(),
        report.boundaries_checked,
        report.unlocated.len()
    );

    // ── Step 5: Fold undersized chunks ───────────────────────────────────
    let chunks = merge_small(chunks, config.min_chunk_size);
    let final_chunks = chunks.len();
    if final_chunks != initial_chunks {
        info!("Merged small chunks: {} → {}", initial_chunks, final_chunks);
    }

    // ── Step 6: Annotate ─────────────────────────────────────────────────
    let annotate_start = Instant::now();
    let results = annotate_all(&client, &chunks, config).await;
    let annotation_duration_ms = annotate_start.elapsed().as_millis() as u64;

    let annotated: Vec<&str> = results
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| r.markup.as_str())
        .collect();
    let failed_chunks = final_chunks - annotated.len();

    if annotated.is_empty() {
        return Err(all_failed(&results, config));
    }
    if failed_chunks > 0 {
        warn!(
            "{} of {} chunks could not be annotated and are omitted",
            failed_chunks, final_chunks
        );
    }

    // ── Step 7: Assemble and render ──────────────────────────────────────
    let document = assemble(annotated.as_slice());
    let markdown = to_light_markup(&document);

    // ── Step 8: Write artifacts ──────────────────────────────────────────
    let prefix = file_prefix(file_name);
    let output_dir = config.output_dir.clone();
    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|e| PaperError::OutputWriteFailed {
            path: output_dir.clone(),
            source: e,
        })?;

    let tex_path = output_dir.join(format!("{}_annotated.tex", prefix));
    let markdown_path = output_dir.join(format!("{}_annotated.md", prefix));
    write_atomic(&tex_path, &document).await?;
    info!("LaTeX saved: {}", tex_path.display());
    write_atomic(&markdown_path, &markdown).await?;
    info!("Markdown saved: {}", markdown_path.display());

    // ── Step 9: Compile ──────────────────────────────────────────────────
    let pdf_path = if config.compile_pdf {
        let job = CompileJob {
            engine: config.latex_engine.clone(),
            tex_path: tex_path.clone(),
            output_dir: output_dir.clone(),
            job_name: prefix,
            log_path: config
                .logs_dir
                .join(format!("{}_{}_compile.txt", file_name, file_timestamp())),
            timeout: Duration::from_secs(config.compile_timeout_secs),
        };
        compile(&job).await.ok()
    } else {
        debug!("Compilation disabled");
        None
    };

    let stats = PaperStats {
        extracted_chars,
        initial_chunks,
        relocated_boundaries: report.relocations.len(),
        final_chunks,
        annotated_chunks: annotated.len(),
        failed_chunks,
        compiled: pdf_path.is_some(),
        annotation_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Done: {}/{} chunks annotated in {}ms",
        stats.annotated_chunks, final_chunks, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(final_chunks, stats.annotated_chunks);
    }

    Ok(PaperOutput {
        tex_path,
        markdown_path,
        pdf_path,
        document,
        markdown,
        chunks: results,
        rebalance: report,
        stats,
    })
}

fn all_failed(results: &[ChunkResult], config: &PaperConfig) -> PaperError {
    let first_error = results
        .iter()
        .find_map(|r| r.error.as_ref())
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());

    PaperError::AllChunksFailed {
        total: results.len(),
        attempts: config.max_attempts,
        first_error,
    }
}

/// Write via a sibling temp file and rename, so readers never see a
/// partial artifact.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), PaperError> {
    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| PaperError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PaperError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.tmp", name))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PaperError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PaperError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the completion client, from most-specific to least-specific:
///
/// 1. pre-built client (`config.client`)
/// 2. named provider + model (`config.provider_name`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_client(config: &PaperConfig) -> Result<Arc<dyn CompletionClient>, PaperError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    let provider = if let Some(ref name) = config.provider_name {
        info!("Using provider '{}' with model '{}'", name, model);
        create_provider(name, model)?
    } else if let Some((prov, env_model)) = env_pair() {
        info!("Using provider '{}' with model '{}' from environment", prov, env_model);
        create_provider(&prov, &env_model)?
    } else if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        info!("Using provider 'openai' with model '{}'", model);
        create_provider("openai", model)?
    } else {
        let (llm_provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| PaperError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        llm_provider
    };

    Ok(Arc::new(ProviderClient::new(provider)))
}

fn env_pair() -> Option<(String, String)> {
    let prov = std::env::var("EDGEQUAKE_LLM_PROVIDER").ok()?;
    let model = std::env::var("EDGEQUAKE_MODEL").ok()?;
    (!prov.is_empty() && !model.is_empty()).then_some((prov, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::client::testing::ScriptedClient;

    #[test]
    fn tmp_sibling_keeps_directory() {
        let p = Path::new("/out/paper_annotated.tex");
        assert_eq!(tmp_sibling(p), PathBuf::from("/out/paper_annotated.tex.tmp"));
    }

    #[test]
    fn explicit_client_wins() {
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::new(vec![]));
        let config = PaperConfig::builder()
            .client(Arc::clone(&client))
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let resolved = resolve_client(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &client));
    }

    #[tokio::test]
    async fn hand_built_config_is_validated_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::new(vec![]));
        let config = PaperConfig {
            chunk_size: 0,
            client: Some(client),
            logs_dir: dir.path().join("logs"),
            output_dir: dir.path().join("output"),
            ..PaperConfig::default()
        };

        let err = process_text("1 Introduction text", "paper.pdf", &config)
            .await
            .unwrap_err();

        assert!(matches!(err, PaperError::InvalidConfig(_)));
        assert!(!dir.path().join("logs").exists());
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_annotated.md");
        write_atomic(&path, "hello\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn all_failed_reports_first_error() {
        let config = PaperConfig::default();
        let results = vec![ChunkResult {
            index: 0,
            source_chars: 10,
            markup: String::new(),
            attempts: 3,
            duration_ms: 1,
            error: Some(crate::error::ChunkError::AnnotationFailed {
                chunk: 1,
                attempts: 3,
                detail: "timeout".into(),
            }),
        }];
        match all_failed(&results, &config) {
            PaperError::AllChunksFailed { total, attempts, first_error } => {
                assert_eq!(total, 1);
                assert_eq!(attempts, 3);
                assert!(first_error.contains("timeout"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
