//! Fixed-size sliding window chunking with character offsets

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::Chunk;

/// Text chunker with configurable window size and overlap
///
/// Window `i` starts at character `i * (chunk_size - overlap)`. The last
/// window is truncated to the remaining text.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        Self::from_config(ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split `text` into windows tagged with `source_id`
    pub fn split(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte position of every char, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = self.config.chunk_size - self.config.chunk_overlap;

        let mut chunks = Vec::with_capacity(total_chars / step + 1);
        let mut start = 0usize;

        loop {
            let end = (start + self.config.chunk_size).min(total_chars);
            let window = &text[boundaries[start]..boundaries[end]];
            chunks.push(Chunk::new(window, start, source_id));

            if end == total_chars {
                break;
            }
            start += step;
        }

        tracing::debug!(
            "Split {} chars from '{}' into {} chunks",
            total_chars,
            source_id,
            chunks.len()
        );

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkingConfig::default(),
        }
    }
}

/// Split `text` with an explicit window size and overlap
pub fn split(text: &str, chunk_size: usize, overlap: usize, source_id: &str) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, overlap)?.split(text, source_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Rebuild the source text by dropping each chunk's overlap with its predecessor
    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut text = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            let skip = covered - chunk.start_offset;
            text.extend(chunk.text.chars().skip(skip));
            covered = chunk.start_offset + chunk.char_len();
        }
        text
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = split("", 1000, 200, "doc").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_window_starts_follow_step() {
        let text = "abcdefghij";
        let chunks = split(text, 4, 1, "doc").unwrap();

        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 3, 6]);
        assert_eq!(chunks[0].text, "abcd");
        assert_eq!(chunks[1].text, "defg");
        assert_eq!(chunks[2].text, "ghij");
    }

    #[test]
    fn test_last_window_is_truncated() {
        let chunks = split("abcdefgh", 5, 2, "doc").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_offset, 3);
        assert_eq!(chunks[1].text, "defgh");

        let short = split("abcdefghi", 5, 2, "doc").unwrap();
        assert_eq!(short.last().unwrap().text, "ghi");
    }

    #[test]
    fn test_text_shorter_than_window_is_single_chunk() {
        let chunks = split("short", 1000, 200, "doc").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..50).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split(&text, 10, 3, "doc").unwrap();

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(prev[prev.len() - 3..], next[..3]);
        }
    }

    #[test]
    fn test_reconstruction_and_ordering() {
        let text = "Paris is the capital of France. It is known for the Eiffel Tower. \
                    Lyon is famous for food, and Marseille sits on the Mediterranean.";
        for (size, overlap) in [(1, 0), (7, 3), (16, 15), (40, 0), (1000, 200)] {
            let chunks = split(text, size, overlap, "doc").unwrap();
            assert_eq!(reconstruct(&chunks), text, "size={} overlap={}", size, overlap);
            assert!(chunks
                .windows(2)
                .all(|w| w[0].start_offset < w[1].start_offset));
        }
    }

    #[test]
    fn test_offsets_count_characters_not_bytes() {
        let text = "héllo wörld ünïcode";
        let chunks = split(text, 6, 2, "doc").unwrap();

        for chunk in &chunks {
            let expected: String = text
                .chars()
                .skip(chunk.start_offset)
                .take(chunk.char_len())
                .collect();
            assert_eq!(chunk.text, expected);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let first = split(&text, 100, 20, "doc").unwrap();
        let second = split(&text, 100, 20, "doc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(split("abc", 0, 0, "doc"), Err(Error::InvalidInput(_))));
        assert!(matches!(split("abc", 5, 5, "doc"), Err(Error::InvalidInput(_))));
        assert!(matches!(split("abc", 5, 7, "doc"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_chunks_carry_source_metadata() {
        let chunks = split("abcdefghij", 4, 1, "doc7").unwrap();
        assert!(chunks.iter().all(|c| c.source_id == "doc7"));
        assert_eq!(chunks[1].extra_metadata["start_offset"], "3");
        assert_eq!(chunks[1].extra_metadata["source_id"], "doc7");
    }
}
