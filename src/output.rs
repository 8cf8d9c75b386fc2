//! Result types returned by a paper-annotation run.

use crate::error::ChunkError;
use crate::pipeline::rebalance::RebalanceReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Annotation outcome for one finalized chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    /// 0-based position in the finalized chunk sequence.
    pub index: usize,
    /// Characters of source text in the chunk.
    pub source_chars: usize,
    /// LaTeX returned by the model; empty when `error` is set.
    pub markup: String,
    /// Attempts used, first call included.
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<ChunkError>,
}

impl ChunkResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperStats {
    /// Characters left after extraction and reference removal.
    pub extracted_chars: usize,
    pub initial_chunks: usize,
    pub relocated_boundaries: usize,
    pub final_chunks: usize,
    pub annotated_chunks: usize,
    pub failed_chunks: usize,
    pub compiled: bool,
    pub annotation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperOutput {
    /// `<prefix>_annotated.tex`
    pub tex_path: PathBuf,
    /// `<prefix>_annotated.md`
    pub markdown_path: PathBuf,
    /// `<prefix>.pdf`; `None` when compilation was skipped or failed.
    pub pdf_path: Option<PathBuf>,
    /// Full LaTeX source as written to `tex_path`.
    pub document: String,
    /// Light-markup rendering as written to `markdown_path`.
    pub markdown: String,
    pub chunks: Vec<ChunkResult>,
    pub rebalance: RebalanceReport,
    pub stats: PaperStats,
}
