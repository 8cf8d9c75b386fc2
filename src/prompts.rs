//! Prompts for the boundary oracle and the chunk annotator.
//!
//! Centralising every prompt here keeps a single source of truth and lets
//! unit tests inspect prompts directly without a live model.
//!
//! Callers can override the annotation prompt via
//! [`crate::config::PaperConfig::annotation_prompt`]; the boundary prompt is
//! fixed because the locator depends on its exact-transcription contract.

/// Reply meaning "this chunk has no truncated section".
pub const NO_INCOMPLETE_SECTION: &str = "NONE";

/// Boundary-check prompt. `{chunk}` is replaced with the chunk text.
pub const BOUNDARY_PROMPT: &str = r#"The text below is one part of an academic paper that was cut into pieces at arbitrary character positions. I only want to keep complete sections in it.

Identify the LAST section or subsection of this text whose content is incomplete because the text is cut off before the section ends.

Reply with the heading of that section ONLY, copied exactly as it appears in the text (I will search for it verbatim, so do not change capitalisation, numbering, punctuation or spacing). Do not add quotes or any explanation.

If every section in the text is complete, reply with exactly: NONE

Text:

{chunk}"#;

/// Default annotation prompt. `{language}` and `{chunk}` are substituted.
pub const ANNOTATION_PROMPT: &str = r#"Below is a fragment of an academic paper. For every complete section in it (a numbered subsection such as 1.1 counts as a section), write a clear, well-organised explanation for a reader who is new to the topic. Do not explain the title, the author list, tables, or the bibliography.

Be selective about detail: summarise unimportant parts briefly, and explain every formula and every implementation method in depth.

Output format:
- Write the explanation in {language}.
- Use LaTeX. Each explained section becomes one \section*{...} whose title is the original section heading, keeping the original numbering when there is one.
- Put display formulas on their own lines; wrap inline mathematical symbols in dollar signs, e.g. "runs in $O(N^2)$ time".
- In \frac commands, always brace both the numerator and the denominator.
- Simplify very long formulas or inequalities so that no single formula becomes too long.
- Output only the LaTeX body: no preamble, no \begin{document}, no Markdown code fences.

Fragment ({position}):

{chunk}"#;

/// Build the boundary-check prompt for one chunk.
pub fn boundary_prompt(chunk: &str) -> String {
    BOUNDARY_PROMPT.replace("{chunk}", chunk)
}

/// Build the annotation prompt for chunk `index` (0-based) of `total`.
///
/// A custom template only needs the `{chunk}` placeholder; `{language}` and
/// `{position}` are filled in when present.
pub fn annotation_prompt(
    template: Option<&str>,
    language: &str,
    chunk: &str,
    index: usize,
    total: usize,
) -> String {
    let position = format!("part {} of {}", index + 1, total);
    template
        .unwrap_or(ANNOTATION_PROMPT)
        .replace("{language}", language)
        .replace("{position}", &position)
        .replace("{chunk}", chunk)
}
