//! Pipeline stages for paper annotation.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; only [`oracle`] and [`annotate`] talk to the model, always through
//! the [`client::CompletionClient`] seam.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ rebalance ──▶ chunk::merge_small
//! (URL/path) (pdfium)   (split)   (oracle+locate)
//!
//!       ──▶ annotate ──▶ assemble ──▶ markdown ──▶ compile
//!           (LLM)        (LaTeX)      (.md)        (xelatex)
//! ```
//!
//! 1. [`input`]     — resolve the path or URL to a local PDF, derive names
//! 2. [`extract`]   — linear page text, bibliography cut off; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`chunk`]     — fixed-size split and small-tail merging
//! 4. [`rebalance`] — move sections cut by a boundary into the next chunk,
//!    using [`oracle`] to name the section and [`locate`] to find it
//! 5. [`annotate`]  — one annotation call per finalized chunk, with retry
//! 6. [`assemble`]  — join, clean and wrap in the XeLaTeX template
//! 7. [`markdown`]  — best-effort light-markup rendering
//! 8. [`compile`]   — two-pass PDF build; failure is logged, not fatal

pub mod annotate;
pub mod assemble;
pub mod chunk;
pub mod client;
pub mod compile;
pub mod extract;
pub mod input;
pub mod locate;
pub mod markdown;
pub mod oracle;
pub mod rebalance;
