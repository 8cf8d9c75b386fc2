//! # edgequake-paper2tex
//!
//! Turn an academic PDF into annotated study notes: a LaTeX document that
//! explains the paper section by section, a Markdown rendering of the same
//! text and, when `xelatex` is installed, a compiled PDF.
//!
//! ## Why chunk repair?
//!
//! A paper is far longer than one prompt, so its text is cut into
//! fixed-size chunks. Fixed-size cuts land in the middle of sections and an
//! explanation of half a section is useless. Before anything is annotated,
//! each boundary is checked by asking the model which section the chunk ends
//! in the middle of, and that section's text is moved to the next chunk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   page text via pdfium, bibliography cut off
//!  ├─ 3. Split     fixed-size chunks (7000 chars), max 25
//!  ├─ 4. Rebalance move truncated sections to the next chunk
//!  ├─ 5. Merge     fold chunks under 1500 chars into their predecessor
//!  ├─ 6. Annotate  one LLM call per chunk, 3 attempts with backoff
//!  ├─ 7. Assemble  escape, wrap in the XeLaTeX template → .tex
//!  ├─ 8. Render    regex rewrite to Markdown → .md
//!  └─ 9. Compile   xelatex, two passes → .pdf (failure is not fatal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_paper2tex::{process_pdf, PaperConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PaperConfig::default();
//!     let output = process_pdf("transformer-xl.pdf", &config).await?;
//!     println!("{}", output.tex_path.display());
//!     eprintln!(
//!         "{}/{} chunks annotated, {} boundaries moved",
//!         output.stats.annotated_chunks,
//!         output.stats.final_chunks,
//!         output.stats.relocated_boundaries
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2tex` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-paper2tex = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PaperConfig, PaperConfigBuilder};
pub use error::{ChunkError, CompileError, LlmError, PaperError};
pub use output::{ChunkResult, PaperOutput, PaperStats};
pub use pipeline::client::{CallKind, CompletionClient, CompletionParams, ProviderClient};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::locate::{MatchTier, SectionMatch};
pub use pipeline::rebalance::{RebalanceReport, Relocation};
pub use process::{process_pdf, process_pdf_sync, process_text};
pub use progress::{NoopProgressCallback, PaperProgressCallback, ProgressCallback};

/// Re-exported so implementors of [`CompletionClient`] need not depend on
/// `async-trait` themselves.
pub use async_trait::async_trait;
