//! Configuration types for paper annotation.
//!
//! All run behaviour is controlled through [`PaperConfig`], built via its
//! [`PaperConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across runs and diff two runs to understand why their
//! outputs differ.

use crate::error::PaperError;
use crate::pipeline::client::CompletionClient;
use crate::pipeline::extract::TextExtractor;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one paper-annotation run.
///
/// Built via [`PaperConfig::builder()`] or using [`PaperConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_paper2tex::PaperConfig;
///
/// let config = PaperConfig::builder()
///     .chunk_size(6000)
///     .max_chunks(30)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PaperConfig {
    /// Characters per chunk in the initial split. Default: 7000.
    ///
    /// Large enough that most subsections fit inside one chunk, small enough
    /// that the annotation stays within the model's output budget.
    pub chunk_size: usize,

    /// Chunks shorter than this are folded into their predecessor after
    /// rebalancing. Default: 1500.
    pub min_chunk_size: usize,

    /// Maximum chunk count after the initial split. Default: 25.
    ///
    /// Longer documents are rejected before any remote call is made.
    pub max_chunks: usize,

    /// LLM model identifier. If None, uses `gpt-4o-mini`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed completion client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn CompletionClient>>,

    /// Pre-constructed text extractor. Defaults to the pdfium extractor.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Sampling temperature for every remote call. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per annotation. Default: 8192.
    pub max_tokens: usize,

    /// Total annotation attempts per chunk, first call included. Default: 3.
    pub max_attempts: u32,

    /// Delay before the second annotation attempt, in ms. Default: 4000.
    ///
    /// Doubles after each further attempt, up to `retry_backoff_max_ms`.
    pub retry_backoff_ms: u64,

    /// Upper bound for the retry delay, in ms. Default: 10000.
    pub retry_backoff_max_ms: u64,

    /// Per-annotation-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Per-boundary-check timeout in seconds. Default: 60.
    pub oracle_timeout_secs: u64,

    /// Annotation calls allowed in flight at once. Default: 1.
    ///
    /// Results are always reassembled in chunk order.
    pub annotation_concurrency: usize,

    /// Natural language the explanation is written in. Default: "English".
    pub language: String,

    /// Custom annotation prompt; `{chunk}` is replaced with the chunk text.
    pub annotation_prompt: Option<String>,

    /// Heading that starts the bibliography; everything from its first
    /// occurrence onward is dropped. Default: "References".
    pub references_heading: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory receiving `.tex`, `.md` and `.pdf` artifacts. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory receiving process and compile logs. Default: `logs`.
    pub logs_dir: PathBuf,

    /// Run the LaTeX compiler after writing the `.tex` file. Default: true.
    pub compile_pdf: bool,

    /// LaTeX engine binary. Default: `xelatex` (needed for xeCJK).
    pub latex_engine: String,

    /// Per-pass compiler timeout in seconds. Default: 300.
    pub compile_timeout_secs: u64,

    /// `EnvFilter` directive for the console log sink. Default: "info".
    ///
    /// The file sink always records at INFO and above.
    pub console_log_filter: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            chunk_size: 7000,
            min_chunk_size: 1500,
            max_chunks: 25,
            model: None,
            provider_name: None,
            client: None,
            extractor: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_attempts: 3,
            retry_backoff_ms: 4000,
            retry_backoff_max_ms: 10_000,
            api_timeout_secs: 300,
            oracle_timeout_secs: 60,
            annotation_concurrency: 1,
            language: "English".to_string(),
            annotation_prompt: None,
            references_heading: "References".to_string(),
            password: None,
            output_dir: PathBuf::from("output"),
            logs_dir: PathBuf::from("logs"),
            compile_pdf: true,
            latex_engine: "xelatex".to_string(),
            compile_timeout_secs: 300,
            console_log_filter: "info".to_string(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PaperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperConfig")
            .field("chunk_size", &self.chunk_size)
            .field("min_chunk_size", &self.min_chunk_size)
            .field("max_chunks", &self.max_chunks)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionClient>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("annotation_concurrency", &self.annotation_concurrency)
            .field("language", &self.language)
            .field("output_dir", &self.output_dir)
            .field("logs_dir", &self.logs_dir)
            .field("compile_pdf", &self.compile_pdf)
            .finish()
    }
}

impl PaperConfig {
    /// Create a new builder for `PaperConfig`.
    pub fn builder() -> PaperConfigBuilder {
        PaperConfigBuilder {
            config: Self::default(),
        }
    }

    /// Delay to wait before annotation attempt `attempt` (1-based).
    ///
    /// Zero before the first attempt; `retry_backoff_ms · 2^(attempt-2)`
    /// afterwards, capped at `retry_backoff_max_ms`.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 2);
        let ms = self
            .retry_backoff_ms
            .saturating_mul(factor)
            .min(self.retry_backoff_max_ms);
        Duration::from_millis(ms)
    }

    /// Check the constraints [`PaperConfigBuilder::build`] enforces.
    ///
    /// The fields are public, so the entry points call this again before
    /// doing any work.
    pub fn validate(&self) -> Result<(), PaperError> {
        if self.chunk_size == 0 {
            return Err(PaperError::InvalidConfig("Chunk size must be ≥ 1".into()));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(PaperError::InvalidConfig(format!(
                "Minimum chunk size ({}) must not exceed chunk size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        if self.max_chunks == 0 {
            return Err(PaperError::InvalidConfig("Max chunks must be ≥ 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(PaperError::InvalidConfig(
                "Max attempts must be ≥ 1".into(),
            ));
        }
        if let Some(ref prompt) = self.annotation_prompt {
            if !prompt.contains("{chunk}") {
                return Err(PaperError::InvalidConfig(
                    "Custom annotation prompt must contain a {chunk} placeholder".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`PaperConfig`].
#[derive(Debug)]
pub struct PaperConfigBuilder {
    config: PaperConfig,
}

impl PaperConfigBuilder {
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn min_chunk_size(mut self, n: usize) -> Self {
        self.config.min_chunk_size = n;
        self
    }

    pub fn max_chunks(mut self, n: usize) -> Self {
        self.config.max_chunks = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn retry_backoff_max_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_max_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn oracle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.oracle_timeout_secs = secs;
        self
    }

    pub fn annotation_concurrency(mut self, n: usize) -> Self {
        self.config.annotation_concurrency = n.max(1);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn annotation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.annotation_prompt = Some(prompt.into());
        self
    }

    pub fn references_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.references_heading = heading.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.logs_dir = dir.into();
        self
    }

    pub fn compile_pdf(mut self, v: bool) -> Self {
        self.config.compile_pdf = v;
        self
    }

    pub fn latex_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.latex_engine = engine.into();
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn console_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.console_log_filter = filter.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PaperConfig, PaperError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
