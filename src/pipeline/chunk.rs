//! Fixed-size splitting and small-chunk merging.
//!
//! The initial split is deliberately naive: it cuts every `size` characters
//! without looking at words, sentences or headings. Section integrity is
//! restored afterwards by [`crate::pipeline::rebalance`], which only needs
//! the chunks to be contiguous and in document order.

/// Cut `text` into consecutive windows of `size` characters.
///
/// Sizes are counted in `char`s so a window never splits a UTF-8 sequence.
/// The last window may be shorter. Empty input yields no chunks.
pub fn split(text: &str, size: usize) -> Vec<String> {
    assert!(size > 0, "chunk size must be positive");

    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}

/// Fold chunks shorter than `min_size` characters into their predecessor.
///
/// The first chunk is never merged away. Concatenated content is unchanged.
pub fn merge_small(chunks: Vec<String>, min_size: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(prev) if chunk.chars().count() < min_size => prev.push_str(&chunk),
            _ => merged.push(chunk),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_reassembles_exactly() {
        let text = "abcdefghij".repeat(7) + "xyz";
        for size in [1, 3, 10, 64, 1000] {
            let chunks = split(&text, size);
            assert_eq!(chunks.concat(), text, "size {size}");
            assert!(chunks.iter().all(|c| c.chars().count() <= size));
        }
    }

    #[test]
    fn split_last_window_is_shorter() {
        let chunks = split("abcdefg", 3);
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn split_empty_is_empty() {
        assert!(split("", 5).is_empty());
    }

    #[test]
    fn split_counts_chars_not_bytes() {
        let chunks = split("αβγδε", 2);
        assert_eq!(chunks, vec!["αβ", "γδ", "ε"]);
    }

    #[test]
    fn merge_appends_small_to_previous() {
        let chunks = vec!["aaaa".into(), "bb".into(), "cccc".into(), "d".into()];
        let merged = merge_small(chunks, 3);
        assert_eq!(merged, vec!["aaaabb", "ccccd"]);
    }

    #[test]
    fn merge_keeps_small_first_chunk() {
        let chunks = vec!["a".into(), "bbbb".into()];
        assert_eq!(merge_small(chunks, 3), vec!["a", "bbbb"]);
    }

    #[test]
    fn merge_chains_consecutive_small_chunks() {
        let chunks = vec!["aaaa".into(), "b".into(), "c".into(), String::new()];
        assert_eq!(merge_small(chunks, 3), vec!["aaaabc"]);
    }

    #[test]
    fn merge_preserves_content_and_never_grows() {
        let chunks: Vec<String> = ["x", "yyyyy", "zz", "wwwwww", "", "v"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let before = chunks.concat();
        let n = chunks.len();
        let merged = merge_small(chunks, 4);
        assert!(merged.len() <= n);
        assert_eq!(merged.concat(), before);
    }
}
