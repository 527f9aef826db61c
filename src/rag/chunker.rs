//! Overlapping text window chunker.
//!
//! Splits page text into word windows that overlap by a fixed number of
//! tokens, so that sentence fragments at a window edge are still covered by
//! the neighbouring window.

/// Split text into overlapping word windows.
///
/// Tokenizes on whitespace and emits windows of up to `chunk_size` tokens,
/// advancing by `chunk_size - overlap` tokens each step (at least one).
/// Tokens are rejoined with single spaces, so chunk text is whitespace
/// normalized and not byte-identical to the source.
///
/// An empty or all-whitespace input yields no chunks. Input shorter than
/// `chunk_size` yields exactly one chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();

    if words.is_empty() {
        return chunks;
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_preserved_between_windows() {
        let text = (0..60).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, 20, 5);

        // step = 15: windows at 0, 15, 30, 45
        assert_eq!(chunks.len(), 4);

        let token_counts: Vec<usize> = chunks.iter().map(|c| c.split(' ').count()).collect();
        assert_eq!(token_counts, vec![20, 20, 20, 15]);

        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].split(' ').collect();
            let right: Vec<&str> = pair[1].split(' ').collect();
            assert_eq!(left[left.len() - 5..], right[..5]);
        }
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text("short text", 50, 10);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 20, 5).is_empty());
        assert!(chunk_text("   \n\t  ", 20, 5).is_empty());
    }

    #[test]
    fn whitespace_is_normalized() {
        let chunks = chunk_text("a\t b\n\nc", 10, 2);
        assert_eq!(chunks, vec!["a b c".to_string()]);
    }

    #[test]
    fn zero_overlap_partitions_exactly() {
        let text = (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, 4, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "8 9");
    }
}
