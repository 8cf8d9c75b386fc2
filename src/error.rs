//! Error types for the edgequake-paper2tex library.
//!
//! Four error types reflect four distinct failure scopes:
//!
//! * [`PaperError`] — **Fatal**: the run cannot produce a document at all
//!   (no extractable text, document too long, every chunk failed). Returned as
//!   `Err(PaperError)` from the top-level `process*` functions.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk could not be annotated but the
//!   rest of the paper is fine. Stored inside [`crate::output::ChunkResult`]
//!   and omitted from the assembled document.
//!
//! * [`LlmError`] — a single remote completion call failed. The oracle turns
//!   it into "no incomplete section"; the annotator retries it.
//!
//! * [`CompileError`] — the external LaTeX compiler failed. Logged, never
//!   propagated: the `.tex` and `.md` artifacts remain valid outputs.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-paper2tex library.
#[derive(Debug, Error)]
pub enum PaperError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    /// Extraction produced no text (scanned paper, or everything sat after "References").
    #[error("Could not extract any text from '{path}'")]
    ExtractionFailed { path: PathBuf },

    // ── Chunking errors ───────────────────────────────────────────────────
    /// The initial split produced more chunks than the configured maximum.
    #[error("Document is too long: {chunks} chunks exceed the limit of {max}")]
    DocumentTooLong { chunks: usize, max: usize },

    /// The initial split produced no chunks at all.
    #[error("No processable content found; the input does not look like a paper")]
    NoContent,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every chunk failed annotation; there is nothing to assemble.
    #[error("All {total} chunks failed after {attempts} attempts each.\nFirst error: {first_error}")]
    AllChunksFailed {
        total: usize,
        attempts: u32,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the per-run log file.
    #[error("Failed to open log file '{path}': {source}")]
    LogSetupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// The run continues unless ALL chunks fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Annotation failed on every attempt.
    #[error("Chunk {chunk}: annotation failed after {attempts} attempts: {detail}")]
    AnnotationFailed {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    /// Nothing left to annotate once whitespace was trimmed.
    #[error("Chunk {chunk}: empty after trimming, not sent for annotation")]
    EmptyChunk { chunk: usize },
}

/// Failure of one remote completion call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// The call did not return within its timeout.
    #[error("completion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned an error (network, HTTP status, rate limit…).
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider answered with nothing usable.
    #[error("empty or invalid completion")]
    EmptyResponse,
}

/// Failure of the external document compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler binary could not be started.
    #[error("could not start '{engine}': {source}")]
    Spawn {
        engine: String,
        #[source]
        source: std::io::Error,
    },

    /// A compiler pass exited unsuccessfully.
    #[error("pass {pass} exited with status {code:?}")]
    PassFailed { pass: u8, code: Option<i32> },

    /// A compiler pass exceeded its timeout.
    #[error("pass {pass} timed out after {secs}s")]
    Timeout { pass: u8, secs: u64 },

    /// The compile log could not be written.
    #[error("failed to write compile log '{path}': {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
