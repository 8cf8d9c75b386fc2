//! Document assembly: join annotated chunks, repair LaTeX quirks in the
//! model output and wrap everything in the XeLaTeX template.
//!
//! ## Rule Order
//!
//! Fences are stripped first so fence lines never get escaped. Reserved
//! characters are escaped before doubled brace escapes are collapsed, so a
//! model-written `\\{` ends up as `\{` and not `\\\{`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Everything before the document body.
pub const LATEX_PREAMBLE: &str = r"\documentclass[12pt]{article}
\usepackage{xeCJK}
\usepackage{graphicx}
\usepackage{amsmath}
\usepackage{amssymb}
\usepackage{hyperref}
\usepackage{url}

\setCJKmainfont{SimSun}
\setCJKsansfont{SimHei}
\setCJKmonofont{SimFang}

\usepackage[top=2.54cm, bottom=2.54cm, left=2.54cm, right=2.54cm]{geometry}
\usepackage{titlesec}
\titleformat*{\section}{\large\bfseries}
\titleformat*{\subsection}{\normalsize\bfseries}

\linespread{1.5}

\begin{document}
";

/// Everything after the document body.
pub const LATEX_POSTAMBLE: &str = r"
\end{document}
";

/// Join annotated chunks in order, clean them and wrap them in the template.
pub fn assemble<S: AsRef<str>>(annotated: &[S]) -> String {
    let joined = annotated
        .iter()
        .map(|s| s.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    wrap_document(&clean_markup(&joined))
}

/// Wrap an already-clean body in the preamble and postamble.
pub fn wrap_document(body: &str) -> String {
    format!("{LATEX_PREAMBLE}\n{body}\n{LATEX_POSTAMBLE}")
}

/// Apply the cleanup rules to raw model output.
///
/// 1. Drop Markdown code-fence lines (models wrap LaTeX in ```` ```latex ````)
/// 2. Escape `%`, `&`, `#` not already preceded by a backslash
/// 3. Collapse doubled brace escapes (`\\{` → `\{`)
pub fn clean_markup(input: &str) -> String {
    let s = strip_fence_lines(input);
    let s = escape_reserved(&s);
    collapse_double_escaped_braces(&s)
}

// ── Rule 1: Strip code fences ────────────────────────────────────────────────

static RE_FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z]*[ \t]*(?:\n|$)").unwrap());

fn strip_fence_lines(input: &str) -> String {
    RE_FENCE_LINE.replace_all(input, "").to_string()
}

// ── Rule 2: Escape reserved characters ───────────────────────────────────────

fn escape_reserved(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut prev: Option<char> = None;
    for c in input.chars() {
        if matches!(c, '%' | '&' | '#') && prev != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

// ── Rule 3: Collapse doubled brace escapes ───────────────────────────────────

static RE_DOUBLE_ESCAPED_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\\([{}])").unwrap());

fn collapse_double_escaped_braces(input: &str) -> String {
    RE_DOUBLE_ESCAPED_BRACE.replace_all(input, r"\$1").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_bare_reserved_characters() {
        assert_eq!(
            escape_reserved("50% of A & B #1"),
            r"50\% of A \& B \#1"
        );
    }

    #[test]
    fn leaves_escaped_characters_alone() {
        let input = r"50\% and \& and \#";
        assert_eq!(escape_reserved(input), input);
    }

    #[test]
    fn escapes_consecutive_characters() {
        assert_eq!(escape_reserved("%%"), r"\%\%");
    }

    #[test]
    fn collapses_double_escaped_braces() {
        assert_eq!(
            collapse_double_escaped_braces(r"set \\{a, b\\}"),
            r"set \{a, b\}"
        );
    }

    #[test]
    fn keeps_latex_line_breaks() {
        assert_eq!(collapse_double_escaped_braces(r"a \\ b"), r"a \\ b");
    }

    #[test]
    fn strips_fence_lines() {
        let input = "```latex\n\\section*{1 Intro}\nText\n```\n";
        assert_eq!(strip_fence_lines(input), "\\section*{1 Intro}\nText\n");
    }

    #[test]
    fn inline_backticks_survive() {
        let input = "see ```code``` here";
        assert_eq!(strip_fence_lines(input), input);
    }

    #[test]
    fn assemble_joins_in_order_with_blank_line() {
        let doc = assemble(&["first", "second"]);
        assert!(doc.contains("first\n\nsecond"));
        assert!(doc.starts_with(r"\documentclass[12pt]{article}"));
        assert!(doc.trim_end().ends_with(r"\end{document}"));
        let body_start = doc.find(r"\begin{document}").unwrap();
        assert!(doc.find("first").unwrap() > body_start);
    }

    #[test]
    fn assemble_escapes_and_normalises() {
        let doc = assemble(&[r"accuracy 95% & rank #1, set \\{x\\}"]);
        assert!(doc.contains(r"accuracy 95\% \& rank \#1, set \{x\}"));
    }
}
