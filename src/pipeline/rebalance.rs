//! Chunk rebalancing: move each chunk's truncated trailing section to the
//! head of the next chunk.
//!
//! ## Algorithm
//!
//! Boundaries are visited strictly left to right, each exactly once. For the
//! boundary between chunk *i* and *i+1*:
//!
//! 1. ask the [`SectionOracle`] about the *current* content of chunk *i*
//!    (it may already have grown at its head from the previous boundary);
//! 2. if a heading comes back, [`locate`] it in chunk *i*;
//! 3. if found at byte `k`, `chunk[i][k..]` is cut off and prepended to
//!    chunk *i+1*.
//!
//! Text only ever moves forward into the immediate neighbour, so the
//! concatenation of all chunks is invariant and the whole pass costs
//! `n − 1` oracle calls. A section spanning three or more chunks is only
//! repaired at its first boundary.

use crate::pipeline::locate::{locate, MatchTier};
use crate::pipeline::oracle::SectionOracle;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One boundary whose split point was moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// 0-based index of the chunk that lost its tail.
    pub chunk: usize,
    /// Heading as reported by the oracle.
    pub section: String,
    /// Byte offset in the chunk where the tail started.
    pub offset: usize,
    /// Characters moved into the next chunk.
    pub moved_chars: usize,
    pub tier: MatchTier,
}

/// Outcome of a rebalancing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub boundaries_checked: usize,
    pub relocations: Vec<Relocation>,
    /// `(chunk, heading)` pairs the oracle reported but the locator missed.
    pub unlocated: Vec<(usize, String)>,
}

/// Rebalance `chunks` in place.
///
/// The slice length never changes; only the boundaries between neighbours move.
pub async fn rebalance(
    chunks: &mut [String],
    oracle: &SectionOracle,
    progress: Option<&ProgressCallback>,
) -> RebalanceReport {
    let mut report = RebalanceReport::default();
    let boundaries = chunks.len().saturating_sub(1);

    for i in 0..boundaries {
        info!("Checking chunk {}/{} for a truncated section", i + 1, chunks.len());
        let section = oracle.find_last_incomplete_section(&chunks[i], i).await;
        report.boundaries_checked += 1;

        match section {
            None => info!("Chunk {}: no incomplete section", i + 1),
            Some(section) => match locate(&chunks[i], &section) {
                Some(found) => {
                    let tail = chunks[i].split_off(found.offset);
                    let moved_chars = tail.chars().count();
                    info!(
                        "Chunk {}: moving {} chars starting at {:?} into chunk {}",
                        i + 1,
                        moved_chars,
                        preview(&tail),
                        i + 2
                    );
                    chunks[i + 1].insert_str(0, &tail);
                    report.relocations.push(Relocation {
                        chunk: i,
                        section,
                        offset: found.offset,
                        moved_chars,
                        tier: found.tier,
                    });
                }
                None => {
                    warn!(
                        "Chunk {}: incomplete section {:?} not found in chunk text, boundary left as is",
                        i + 1,
                        section
                    );
                    report.unlocated.push((i, section));
                }
            },
        }

        if let Some(cb) = progress {
            cb.on_boundary_checked(i + 1, boundaries);
        }
    }

    report
}

fn preview(s: &str) -> String {
    s.chars().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaperConfig;
    use crate::error::LlmError;
    use crate::pipeline::client::testing::ScriptedClient;
    use std::sync::Arc;

    fn oracle_with(script: Vec<Result<String, LlmError>>) -> (SectionOracle, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient::new(script).with_fallback(Ok("NONE".into())));
        (
            SectionOracle::new(client.clone(), &PaperConfig::default()),
            client,
        )
    }

    #[tokio::test]
    async fn moves_truncated_section_to_next_chunk() {
        let mut chunks = vec![
            "3 Method\nWe do things.\n4 Experiments\nWe ran the mod".to_string(),
            "el on three datasets.\n5 Conclusion\n".to_string(),
            "Thanks.".to_string(),
        ];
        let original_next = chunks[1].clone();
        let (oracle, client) = oracle_with(vec![Ok("4 Experiments".into()), Ok("NONE".into())]);

        let report = rebalance(&mut chunks, &oracle, None).await;

        assert_eq!(chunks[0], "3 Method\nWe do things.\n");
        assert!(chunks[1].starts_with("4 Experiments\nWe ran the mod"));
        assert!(chunks[1].ends_with(&original_next));
        assert_eq!(chunks[2], "Thanks.");
        assert_eq!(client.calls(), 2);
        assert_eq!(report.boundaries_checked, 2);
        assert_eq!(report.relocations.len(), 1);
        assert_eq!(report.relocations[0].tier, MatchTier::Exact);
    }

    #[tokio::test]
    async fn preserves_concatenation() {
        let mut chunks = vec![
            "1 Intro aaa 2 Background bb".to_string(),
            "b 3 Model ccc".to_string(),
            "cc 4 Results dd".to_string(),
            "d end".to_string(),
        ];
        let before = chunks.concat();
        let (oracle, _) = oracle_with(vec![
            Ok("2 Background".into()),
            Ok("3 Model".into()),
            Ok("4 Results".into()),
        ]);

        let report = rebalance(&mut chunks, &oracle, None).await;

        assert_eq!(chunks.concat(), before);
        assert_eq!(chunks.len(), 4);
        assert_eq!(report.relocations.len(), 3);
        assert_eq!(chunks[0], "1 Intro aaa ");
        assert_eq!(chunks[3], "4 Results ddd end");
    }

    #[tokio::test]
    async fn oracle_sees_content_grown_by_previous_boundary() {
        let mut chunks = vec![
            "A 1 Intro x".to_string(),
            "y 2 Next z".to_string(),
            "w".to_string(),
        ];
        let (oracle, client) = oracle_with(vec![Ok("1 Intro".into()), Ok("NONE".into())]);

        rebalance(&mut chunks, &oracle, None).await;

        let prompts = client.prompts();
        assert!(prompts[1].ends_with("1 Intro xy 2 Next z"));
    }

    #[tokio::test]
    async fn unlocated_section_leaves_chunk_unchanged() {
        let mut chunks = vec!["alpha beta".to_string(), "gamma".to_string()];
        let (oracle, _) = oracle_with(vec![Ok("7 Appendix".into())]);

        let report = rebalance(&mut chunks, &oracle, None).await;

        assert_eq!(chunks, vec!["alpha beta", "gamma"]);
        assert_eq!(report.unlocated, vec![(0, "7 Appendix".to_string())]);
        assert!(report.relocations.is_empty());
    }

    #[tokio::test]
    async fn oracle_error_leaves_chunk_unchanged() {
        let mut chunks = vec!["alpha 2 Beta".to_string(), "gamma".to_string()];
        let (oracle, _) = oracle_with(vec![Err(LlmError::Provider("503".into()))]);

        let report = rebalance(&mut chunks, &oracle, None).await;

        assert_eq!(chunks, vec!["alpha 2 Beta", "gamma"]);
        assert!(report.relocations.is_empty());
        assert!(report.unlocated.is_empty());
    }

    #[tokio::test]
    async fn single_chunk_makes_no_calls() {
        let mut chunks = vec!["only".to_string()];
        let (oracle, client) = oracle_with(vec![]);

        let report = rebalance(&mut chunks, &oracle, None).await;

        assert_eq!(client.calls(), 0);
        assert_eq!(report.boundaries_checked, 0);
    }
}
