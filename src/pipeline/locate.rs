//! Locate an oracle-reported section heading inside a chunk.
//!
//! The oracle is asked to copy the heading verbatim, but models drift: they
//! collapse double spaces, or the PDF extractor glued tokens together that
//! the model then separates again. Matching therefore escalates through
//! three tiers, all case-insensitive, and the first tier that hits wins:
//!
//! 1. [`MatchTier::Exact`] — the literal heading.
//! 2. [`MatchTier::FlexibleWhitespace`] — the heading's tokens separated by
//!    one or more whitespace characters of any kind.
//! 3. [`MatchTier::TokenSequence`] — the tokens in order, separated by
//!    optional whitespace.
//!
//! Tier 3 is lenient on purpose and can match a short, generic heading
//! inside unrelated text (`"the"` inside `"theory"`). No leniency threshold
//! is applied.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which matching tier located the heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTier {
    Exact,
    FlexibleWhitespace,
    TokenSequence,
}

/// A located heading: byte offset into the chunk and the exact text matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMatch {
    pub offset: usize,
    pub matched: String,
    pub tier: MatchTier,
}

/// Find the first occurrence of `section` in `chunk`.
///
/// Returns `None` when no tier matches, or when `section` has no
/// non-whitespace content.
pub fn locate(chunk: &str, section: &str) -> Option<SectionMatch> {
    let tokens: Vec<String> = section.split_whitespace().map(regex::escape).collect();
    if tokens.is_empty() {
        return None;
    }

    let tiers = [
        (MatchTier::Exact, regex::escape(section)),
        (MatchTier::FlexibleWhitespace, tokens.join(r"\s+")),
        (MatchTier::TokenSequence, tokens.join(r"\s*")),
    ];

    for (tier, pattern) in tiers {
        let Some(re) = compile(&pattern) else {
            continue;
        };
        if let Some(m) = re.find(chunk) {
            debug!(
                "Located section {:?} at byte {} ({:?}): {:?}",
                section,
                m.start(),
                tier,
                m.as_str()
            );
            return Some(SectionMatch {
                offset: m.start(),
                matched: m.as_str().to_string(),
                tier,
            });
        }
    }

    debug!("Section {:?} not found under any tier", section);
    None
}

fn compile(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Could not compile heading pattern: {}", e);
            None
        }
    }
}
