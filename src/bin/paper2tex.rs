//! CLI binary for edgequake-paper2tex.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PaperConfig` and prints the artifact paths.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_paper2tex::{process_pdf, PaperConfig, PaperProgressCallback, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while boundaries are checked, then a bar
/// over the finalized chunks with one log line per chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_position(0);
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Annotating");
        self.bar.reset_eta();
    }

    fn take_elapsed_ms(&self, chunk: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&chunk))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl PaperProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_chunks: usize) {
        self.bar.set_prefix("Rebalancing");
        self.bar.set_message(format!("{total_chunks} chunks"));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Split into {total_chunks} chunks, checking boundaries…"))
        ));
    }

    fn on_boundary_checked(&self, boundary: usize, total_boundaries: usize) {
        self.bar
            .set_message(format!("boundary {boundary}/{total_boundaries}"));
    }

    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        if self.bar.length() != Some(total_chunks as u64) {
            self.activate_bar(total_chunks);
        }
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(chunk, Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk}"));
    }

    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, markup_len: usize) {
        let elapsed_ms = self.take_elapsed_ms(chunk);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk,
            total_chunks,
            dim(&format!("{markup_len:>6} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let elapsed_ms = self.take_elapsed_ms(chunk);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk,
            total_chunks,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_chunks: usize, success_count: usize) {
        let failed = total_chunks.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} chunks annotated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks annotated  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_chunks,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Annotate a paper into ./output (logs in ./logs)
  paper2tex transformer-xl.pdf

  # Explanations in Chinese, different output directory
  paper2tex --language Chinese --output-dir notes paper.pdf

  # Skip xelatex, keep only .tex and .md
  paper2tex --no-compile paper.pdf

  # From a URL, with a specific model
  paper2tex --provider openai --model gpt-4o https://arxiv.org/pdf/1901.02860

  # JSON result (paths, per-chunk outcome, rebalancing report)
  paper2tex --json paper.pdf > run.json

OUTPUTS:
  <output-dir>/<prefix>_annotated.tex   LaTeX document (xeCJK template)
  <output-dir>/<prefix>_annotated.md    Markdown rendering of the same
  <output-dir>/<prefix>.pdf             Compiled PDF (needs xelatex)
  <logs-dir>/<file>_<time>_process.log  Run log
  <logs-dir>/<file>_<time>_compile.txt  Compiler output

  <prefix> is the first 12 characters of the input file name.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                Console log filter (the process log is always INFO)
"#;

/// Annotate academic papers into LaTeX and Markdown study notes.
#[derive(Parser, Debug)]
#[command(
    name = "paper2tex",
    version,
    about = "Annotate academic PDF papers into LaTeX and Markdown using LLMs",
    long_about = "Extract the text of an academic paper, split it into chunks along section \
boundaries, have an LLM explain every section, and assemble the explanations into a LaTeX \
document, a Markdown rendering and (with xelatex installed) a compiled PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the .tex, .md and .pdf artifacts.
    #[arg(short, long, env = "PAPER2TEX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Directory for process and compile logs.
    #[arg(long, env = "PAPER2TEX_LOGS_DIR", default_value = "logs")]
    logs_dir: PathBuf,

    /// LLM model ID (default: gpt-4o-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Characters per chunk in the initial split.
    #[arg(long, env = "PAPER2TEX_CHUNK_SIZE", default_value_t = 7000)]
    chunk_size: usize,

    /// Chunks shorter than this are merged into their predecessor.
    #[arg(long, env = "PAPER2TEX_MIN_CHUNK_SIZE", default_value_t = 1500)]
    min_chunk_size: usize,

    /// Reject papers that split into more chunks than this.
    #[arg(long, env = "PAPER2TEX_MAX_CHUNKS", default_value_t = 25)]
    max_chunks: usize,

    /// Annotation attempts per chunk, first call included.
    #[arg(long, env = "PAPER2TEX_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Per-annotation LLM call timeout in seconds.
    #[arg(long, env = "PAPER2TEX_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Annotation calls in flight at once.
    #[arg(short, long, env = "PAPER2TEX_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Language the explanations are written in.
    #[arg(long, env = "PAPER2TEX_LANGUAGE", default_value = "English")]
    language: String,

    /// Text file with a custom annotation prompt containing `{chunk}`.
    #[arg(long, env = "PAPER2TEX_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Do not run xelatex.
    #[arg(long, env = "PAPER2TEX_NO_COMPILE")]
    no_compile: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER2TEX_PASSWORD")]
    password: Option<String>,

    /// Print the full result as JSON.
    #[arg(long, env = "PAPER2TEX_JSON")]
    json: bool,

    /// Enable DEBUG-level console logs.
    #[arg(short, long, env = "PAPER2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER2TEX_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER2TEX_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console logs stay at ERROR while the progress bar is shown; the
    // process log file records INFO regardless.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let console_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string());

    // ── Ensure PDFium engine is available ───────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            eprintln!("{} Downloading PDF engine (first run only)…", cyan("◆"));
        }
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PaperProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, console_filter, progress_cb).await?;

    let output = process_pdf(&cli.input, &config)
        .await
        .context("Annotation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} chunks  {} boundaries moved  {}ms",
            if stats.failed_chunks == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.annotated_chunks,
            stats.final_chunks,
            stats.relocated_boundaries,
            stats.total_duration_ms,
        );
        if config.compile_pdf && output.pdf_path.is_none() {
            eprintln!(
                "   {}",
                dim("PDF compilation failed; see the compile log in the logs directory")
            );
        }
    }

    println!("{}", output.tex_path.display());
    println!("{}", output.markdown_path.display());
    if let Some(ref pdf) = output.pdf_path {
        println!("{}", pdf.display());
    }

    Ok(())
}

/// Map CLI args to `PaperConfig`.
async fn build_config(
    cli: &Cli,
    console_filter: String,
    progress: Option<ProgressCallback>,
) -> Result<PaperConfig> {
    let mut builder = PaperConfig::builder()
        .output_dir(cli.output_dir.clone())
        .logs_dir(cli.logs_dir.clone())
        .chunk_size(cli.chunk_size)
        .min_chunk_size(cli.min_chunk_size)
        .max_chunks(cli.max_chunks)
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.api_timeout)
        .annotation_concurrency(cli.concurrency)
        .language(cli.language.clone())
        .compile_pdf(!cli.no_compile)
        .console_log_filter(console_filter);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read annotation prompt from {:?}", path))?;
        builder = builder.annotation_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
