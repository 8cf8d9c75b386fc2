//! Best-effort LaTeX → Markdown rewrite of the assembled document.
//!
//! This is a fixed sequence of regex rules, not a parser. Constructs with
//! nested braces, custom macros or environments not listed below pass
//! through unchanged. Rules are order-sensitive: inline commands are
//! rewritten first so that a heading like `\section*{\textbf{A}}` still
//! becomes a Markdown heading.
//!
//! Rules (applied in order):
//! 1. Keep only the `document` body when a preamble is present
//! 2. `\textbf` / `\textit` / `\emph` / `\texttt`
//! 3. `\href{url}{text}` and `\url{url}`
//! 4. `\cite{a,b}` → `[a, b]`, `\ref{x}` / `\eqref{x}` → `x`
//! 5. `\section` / `\subsection` / `\subsubsection` → `##` / `###` / `####`
//! 6. `\paragraph{x}` → `**x**`
//! 7. `equation` / `align` / `gather` / `multline` and `\[ \]` → `$$` blocks
//! 8. `itemize` / `enumerate` / `description` markers dropped, `\item` → `- `
//! 9. `\%`, `\&`, `\#`, `\_` unescaped
//! 10. Blank-line runs collapsed, single trailing newline

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub fn to_light_markup(document: &str) -> String {
    let s = extract_body(document);
    let s = convert_emphasis(&s);
    let s = convert_links(&s);
    let s = convert_references(&s);
    let s = convert_headings(&s);
    let s = convert_paragraph_titles(&s);
    let s = convert_display_math(&s);
    let s = convert_lists(&s);
    let s = unescape_reserved(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Document body ────────────────────────────────────────────────────

static RE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{document\}(.*?)\\end\{document\}").unwrap());

fn extract_body(input: &str) -> String {
    match RE_BODY.captures(input) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Emphasis ─────────────────────────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\textbf\{([^{}]*)\}").unwrap());
static RE_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:textit|emph)\{([^{}]*)\}").unwrap());
static RE_MONO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\texttt\{([^{}]*)\}").unwrap());

fn convert_emphasis(input: &str) -> String {
    let s = RE_BOLD.replace_all(input, "**$1**");
    let s = RE_ITALIC.replace_all(&s, "*$1*");
    RE_MONO.replace_all(&s, "`$1`").to_string()
}

// ── Rule 3: Links ────────────────────────────────────────────────────────────

static RE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\href\{([^{}]*)\}\{([^{}]*)\}").unwrap());
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\url\{([^{}]*)\}").unwrap());

fn convert_links(input: &str) -> String {
    let s = RE_HREF.replace_all(input, "[$2]($1)");
    RE_URL.replace_all(&s, "<$1>").to_string()
}

// ── Rule 4: Citations and cross-references ───────────────────────────────────

static RE_CITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\cite[pt]?\{([^{}]*)\}").unwrap());
static RE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(?:eq)?ref\{([^{}]*)\}").unwrap());

fn convert_references(input: &str) -> String {
    let s = RE_CITE.replace_all(input, |caps: &Captures<'_>| {
        let keys: Vec<&str> = caps[1].split(',').map(str::trim).collect();
        format!("[{}]", keys.join(", "))
    });
    RE_REF.replace_all(&s, "$1").to_string()
}

// ── Rule 5: Section headings ─────────────────────────────────────────────────

static RE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\((?:sub)*)section\*?\{([^{}]*)\}").unwrap());

fn convert_headings(input: &str) -> String {
    RE_SECTION
        .replace_all(input, |caps: &Captures<'_>| {
            let level = (2 + caps[1].len() / 3).min(6);
            format!("\n{} {}\n", "#".repeat(level), caps[2].trim())
        })
        .to_string()
}

// ── Rule 6: Paragraph titles ─────────────────────────────────────────────────

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\paragraph\*?\{([^{}]*)\}").unwrap());

fn convert_paragraph_titles(input: &str) -> String {
    RE_PARAGRAPH.replace_all(input, "**$1**").to_string()
}

// ── Rule 7: Display math ─────────────────────────────────────────────────────

static RE_MATH_ENV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\\begin\{(?:equation|align|gather|multline)\*?\}(.*?)\\end\{(?:equation|align|gather|multline)\*?\}",
    )
    .unwrap()
});
static RE_MATH_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\[(.*?)\\\]").unwrap());

fn convert_display_math(input: &str) -> String {
    let to_block = |caps: &Captures<'_>| format!("$$\n{}\n$$", caps[1].trim());
    let s = RE_MATH_ENV.replace_all(input, to_block);
    RE_MATH_BRACKETS.replace_all(&s, to_block).to_string()
}

// ── Rule 8: Lists ────────────────────────────────────────────────────────────

static RE_LIST_ENV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\\(?:begin|end)\{(?:itemize|enumerate|description)\}[ \t]*(?:\n|$)")
        .unwrap()
});
static RE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)\\item(?:\[([^\]]*)\])?[ \t]*").unwrap());

fn convert_lists(input: &str) -> String {
    let s = RE_LIST_ENV.replace_all(input, "");
    RE_ITEM
        .replace_all(&s, |caps: &Captures<'_>| match caps.get(2) {
            Some(label) => format!("{}- **{}** ", &caps[1], label.as_str()),
            None => format!("{}- ", &caps[1]),
        })
        .to_string()
}

// ── Rule 9: Unescape reserved characters ─────────────────────────────────────

static RE_ESCAPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([%&#_])").unwrap());

fn unescape_reserved(input: &str) -> String {
    RE_ESCAPED.replace_all(input, "$1").to_string()
}

// ── Rule 10: Whitespace ──────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assemble::wrap_document;

    #[test]
    fn headings_by_level() {
        assert_eq!(convert_headings(r"\section*{1 Intro}").trim(), "## 1 Intro");
        assert_eq!(convert_headings(r"\subsection{1.1 Setup}").trim(), "### 1.1 Setup");
        assert_eq!(
            convert_headings(r"\subsubsection*{Detail}").trim(),
            "#### Detail"
        );
    }

    #[test]
    fn emphasis_variants() {
        assert_eq!(
            convert_emphasis(r"\textbf{a} \emph{b} \textit{c} \texttt{d}"),
            "**a** *b* *c* `d`"
        );
    }

    #[test]
    fn citations_and_refs() {
        assert_eq!(
            convert_references(r"as in \cite{vaswani2017, dai2019} and Eq. \eqref{eq:1}"),
            "as in [vaswani2017, dai2019] and Eq. eq:1"
        );
    }

    #[test]
    fn links() {
        assert_eq!(
            convert_links(r"\href{https://arxiv.org}{arXiv} or \url{https://x.org}"),
            "[arXiv](https://arxiv.org) or <https://x.org>"
        );
    }

    #[test]
    fn display_math_blocks() {
        let input = "before\n\\begin{equation*}\n  E = mc^2\n\\end{equation*}\nafter \\[ a+b \\]";
        let out = convert_display_math(input);
        assert!(out.contains("$$\nE = mc^2\n$$"));
        assert!(out.contains("$$\na+b\n$$"));
        assert!(!out.contains("begin{equation"));
    }

    #[test]
    fn inline_math_is_untouched() {
        let out = to_light_markup("runs in $O(N^2)$ time");
        assert_eq!(out, "runs in $O(N^2)$ time\n");
    }

    #[test]
    fn lists() {
        let input = "\\begin{itemize}\n  \\item one\n  \\item[Key] two\n\\end{itemize}\n";
        assert_eq!(convert_lists(input), "  - one\n  - **Key** two\n");
    }

    #[test]
    fn unknown_commands_pass_through() {
        let out = to_light_markup(r"\mycommand{x} stays");
        assert_eq!(out, "\\mycommand{x} stays\n");
    }

    #[test]
    fn unescapes_reserved() {
        assert_eq!(unescape_reserved(r"50\% \& \#1 a\_b"), "50% & #1 a_b");
    }

    #[test]
    fn full_document_round() {
        let body = "\\section*{3.2 Related Work}\nPrior work \\cite{a} reaches 90\\%.\n\n\n\n\\paragraph{Note} done";
        let md = to_light_markup(&wrap_document(body));
        assert!(!md.contains("documentclass"));
        assert!(md.starts_with("## 3.2 Related Work\n"));
        assert!(md.contains("Prior work [a] reaches 90%."));
        assert!(md.contains("**Note** done"));
        assert!(!md.contains("\n\n\n"));
        assert!(md.ends_with('\n'));
    }
}
