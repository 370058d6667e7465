//! Text chunking engine.
//!
//! Splits one document's text into bounded, optionally overlapping [`Chunk`]s.
//! Three strategies are supported:
//!
//! - **recursive** (default) — splits on progressively finer separators
//!   (paragraphs, lines, sentences, clauses, spaces, raw characters),
//!   accumulating parts into `chunk_size`-bounded buffers and seeding each
//!   new buffer with the previous buffer's trailing `chunk_overlap` chars.
//! - **sentence** — joins whole sentences up to `chunk_size`, no overlap.
//! - **fixed** — a sliding character window advancing by
//!   `chunk_size - chunk_overlap`.
//!
//! All sizes and offsets count characters, not bytes. Chunking is pure and
//! deterministic; identical input and config always produce identical output.

use serde::Deserialize;

use crate::models::Chunk;

/// Separator tiers for the recursive strategy, coarsest first.
const SEPARATOR_TIERS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "];

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_strategy() -> ChunkStrategy {
    ChunkStrategy::Recursive
}

/// Chunking strategy selector, deserialized from the `[chunking]` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Recursive,
    Sentence,
    Fixed,
}

/// Chunking parameters. `chunk_overlap` must be strictly less than
/// `chunk_size`; `load_config` rejects violations before any call here.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_strategy")]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: default_strategy(),
        }
    }
}

/// Split text into chunks according to the configured strategy.
///
/// Empty or whitespace-only input yields no chunks. Indices are contiguous
/// from 0 in emission order.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match config.strategy {
        ChunkStrategy::Recursive => chunk_recursive(text, config),
        ChunkStrategy::Sentence => chunk_sentences(text, config),
        ChunkStrategy::Fixed => chunk_fixed(text, config),
    }
}

/// Running buffer for the accumulate-flush strategies.
///
/// The buffer is always a contiguous character range of the original text:
/// parts arrive left to right and each seed is the tail of the buffer it
/// replaces, so `buf` equals the original text at
/// `[buf_start, buf_start + buf_chars)`.
struct Accumulator<'a> {
    config: &'a ChunkConfig,
    chunks: Vec<Chunk>,
    buf: String,
    buf_start: usize,
    buf_chars: usize,
    overlap: usize,
}

impl<'a> Accumulator<'a> {
    fn new(config: &'a ChunkConfig, overlap: usize) -> Self {
        Accumulator {
            config,
            chunks: Vec::new(),
            buf: String::new(),
            buf_start: 0,
            buf_chars: 0,
            overlap,
        }
    }

    /// Record the current buffer as a chunk (trimmed; dropped if empty),
    /// then seed the next buffer with the trailing overlap characters.
    fn flush(&mut self) {
        if self.buf_chars == 0 {
            return;
        }
        let trimmed = self.buf.trim();
        if !trimmed.is_empty() {
            self.chunks.push(Chunk {
                text: trimmed.to_string(),
                index: self.chunks.len(),
                start_offset: self.buf_start,
                end_offset: self.buf_start + self.buf_chars,
            });
        }
        if self.overlap > 0 {
            let keep = self.overlap.min(self.buf_chars);
            let tail: String = {
                let skip = self.buf_chars - keep;
                self.buf.chars().skip(skip).collect()
            };
            self.buf_start += self.buf_chars - keep;
            self.buf = tail;
            self.buf_chars = keep;
        } else {
            self.buf_start += self.buf_chars;
            self.buf.clear();
            self.buf_chars = 0;
        }
    }

    /// Append one part, flushing first when it would overflow the buffer.
    fn push(&mut self, part: &str, part_start: usize, part_chars: usize) {
        if self.buf_chars > 0 && self.buf_chars + part_chars > self.config.chunk_size {
            self.flush();
        }
        if self.buf_chars == 0 {
            self.buf_start = part_start;
        }
        self.buf.push_str(part);
        self.buf_chars += part_chars;
    }

    /// Append a single character; used by the raw-character fallback tier.
    fn push_char(&mut self, ch: char, pos: usize) {
        if self.buf_chars >= self.config.chunk_size {
            self.flush();
        }
        if self.buf_chars == 0 {
            self.buf_start = pos;
        }
        self.buf.push(ch);
        self.buf_chars += 1;
    }

    /// Record whatever remains without seeding a successor.
    fn finish(mut self) -> Vec<Chunk> {
        if self.buf_chars > 0 {
            let trimmed = self.buf.trim();
            if !trimmed.is_empty() {
                self.chunks.push(Chunk {
                    text: trimmed.to_string(),
                    index: self.chunks.len(),
                    start_offset: self.buf_start,
                    end_offset: self.buf_start + self.buf_chars,
                });
            }
        }
        self.chunks
    }
}

fn chunk_recursive(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let mut acc = Accumulator::new(config, config.chunk_overlap);
    add_text(&mut acc, text, 0, SEPARATOR_TIERS);
    acc.finish()
}

/// Feed `text` (starting at char offset `start`) through the accumulator,
/// splitting by the first separator tier present and recursing into any part
/// that still exceeds `chunk_size` with the remaining finer tiers.
fn add_text(acc: &mut Accumulator, text: &str, start: usize, tiers: &[&str]) {
    let n_chars = text.chars().count();
    if n_chars <= acc.config.chunk_size {
        acc.push(text, start, n_chars);
        return;
    }

    match tiers.iter().position(|sep| text.contains(sep)) {
        Some(i) => {
            let sep = tiers[i];
            let finer = &tiers[i + 1..];
            let mut pos = start;
            // split_inclusive keeps each separator with the part before it,
            // so rejoining parts never loses characters.
            for part in text.split_inclusive(sep) {
                let part_chars = part.chars().count();
                add_text(acc, part, pos, finer);
                pos += part_chars;
            }
        }
        None => {
            // No separator at any tier: fall back to raw characters.
            for (i, ch) in text.chars().enumerate() {
                acc.push_char(ch, start + i);
            }
        }
    }
}

fn chunk_sentences(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    // Sentence mode never overlaps chunks.
    let mut acc = Accumulator::new(config, 0);
    let mut pos = 0;
    for sentence in split_sentences(text) {
        let n_chars = sentence.chars().count();
        acc.push(sentence, pos, n_chars);
        pos += n_chars;
    }
    acc.finish()
}

/// Split into sentences ending at `.`/`!`/`?` followed by whitespace.
/// The terminator stays with its sentence; the following whitespace opens
/// the next one, so the pieces tile the input exactly.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut sentence_start = 0;
    let mut prev: Option<(usize, char)> = None;
    for (byte_pos, ch) in text.char_indices() {
        if let Some((prev_pos, prev_ch)) = prev {
            if matches!(prev_ch, '.' | '!' | '?') && ch.is_whitespace() {
                let end = prev_pos + prev_ch.len_utf8();
                sentences.push(&text[sentence_start..end]);
                sentence_start = end;
            }
        }
        prev = Some((byte_pos, ch));
    }
    if sentence_start < text.len() {
        sentences.push(&text[sentence_start..]);
    }
    sentences
}

fn chunk_fixed(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let step = config.chunk_size.saturating_sub(config.chunk_overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        // Windows keep their whitespace so consecutive chunks overlap by
        // exactly chunk_overlap characters of stored text.
        if !window.trim().is_empty() {
            chunks.push(Chunk {
                text: window,
                index: chunks.len(),
                start_offset: start,
                end_offset: end,
            });
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize, strategy: ChunkStrategy) -> ChunkConfig {
        ChunkConfig {
            chunk_size,
            chunk_overlap,
            strategy,
        }
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        for strategy in [
            ChunkStrategy::Recursive,
            ChunkStrategy::Sentence,
            ChunkStrategy::Fixed,
        ] {
            assert!(chunk_text("", &config(100, 20, strategy)).is_empty());
            assert!(chunk_text("  \n\n \t ", &config(100, 20, strategy)).is_empty());
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", &config(100, 20, ChunkStrategy::Recursive));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 13);
    }

    #[test]
    fn test_recursive_joins_paragraphs_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_text(text, &config(200, 20, ChunkStrategy::Recursive));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("First paragraph."));
        assert!(chunks[0].text.contains("Third paragraph."));
    }

    #[test]
    fn test_recursive_indices_contiguous() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} with a little padding.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, &config(120, 30, ChunkStrategy::Recursive));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_recursive_overlap_seeds_next_buffer() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let overlap = 5;
        let chunks = chunk_text(text, &config(20, overlap, ChunkStrategy::Recursive));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(
                pair[1].start_offset,
                pair[0].end_offset - overlap,
                "buffer was not seeded with the previous tail"
            );
        }
    }

    #[test]
    fn test_recursive_oversized_part_uses_finer_tiers() {
        // One long unbroken token forces the raw-character fallback.
        let text = "a".repeat(50);
        let chunks = chunk_text(&text, &config(10, 0, ChunkStrategy::Recursive));
        assert_eq!(chunks.len(), 5);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.start_offset, i * 10);
            assert_eq!(c.end_offset, i * 10 + 10);
            assert_eq!(c.text.len(), 10);
        }
    }

    #[test]
    fn test_recursive_coverage_without_overlap() {
        let text = "Rust has zero-cost abstractions. Ownership prevents data races.\n\n\
                    The borrow checker enforces aliasing rules at compile time. \
                    Lifetimes describe how long references remain valid.\n\n\
                    Cargo manages builds; crates.io hosts packages.";
        let chunks = chunk_text(text, &config(60, 0, ChunkStrategy::Recursive));
        assert!(chunks.len() > 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(squash(&joined), squash(text));
    }

    #[test]
    fn test_recursive_offsets_cover_original_region() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk_text(text, &config(15, 0, ChunkStrategy::Recursive));
        let total: usize = text.chars().count();
        assert_eq!(chunks.first().map(|c| c.start_offset), Some(0));
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(total));
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_offset, pair[0].end_offset);
        }
    }

    #[test]
    fn test_sentence_mode_groups_whole_sentences() {
        let text = "One sentence here. Another sentence there. A third one follows. Done.";
        let chunks = chunk_text(text, &config(45, 0, ChunkStrategy::Sentence));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(
                c.text.ends_with('.'),
                "chunk should end on a sentence boundary: {:?}",
                c.text
            );
        }
        // No inter-chunk overlap in sentence mode.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset >= pair[0].end_offset);
        }
    }

    #[test]
    fn test_sentence_mode_oversized_sentence_kept_whole() {
        let long = format!("{} end.", "word ".repeat(30));
        let text = format!("Short one. {}", long);
        let chunks = chunk_text(&text, &config(40, 0, ChunkStrategy::Sentence));
        assert!(chunks.iter().any(|c| c.text.chars().count() > 40));
    }

    #[test]
    fn test_fixed_window_offsets_and_overlap() {
        // 250 characters, chunk_size 100, overlap 20: windows start every 80.
        let text: String = "0123456789".repeat(25);
        let chunks = chunk_text(&text, &config(100, 20, ChunkStrategy::Fixed));
        assert_eq!(chunks.len(), 4);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 80, 160, 240]);
        assert_eq!(chunks[3].end_offset, 250);
        for pair in chunks.windows(2) {
            let tail_len = 20.min(pair[1].text.chars().count());
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - tail_len)
                .collect();
            let head: String = pair[1].text.chars().take(tail_len).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_fixed_short_text_single_window() {
        let chunks = chunk_text("short", &config(100, 20, ChunkStrategy::Fixed));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
        assert_eq!(chunks[0].end_offset, 5);
    }

    #[test]
    fn test_unicode_multibyte_safe() {
        let text = "é".repeat(30);
        let fixed = chunk_text(&text, &config(10, 2, ChunkStrategy::Fixed));
        assert!(!fixed.is_empty());
        for c in &fixed {
            assert!(c.text.chars().count() <= 10);
            assert!(c.end_offset <= 30);
        }
        let recursive = chunk_text(&text, &config(10, 2, ChunkStrategy::Recursive));
        assert!(!recursive.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta.\n\nEpsilon zeta, eta theta; iota kappa.";
        for strategy in [
            ChunkStrategy::Recursive,
            ChunkStrategy::Sentence,
            ChunkStrategy::Fixed,
        ] {
            let a = chunk_text(text, &config(25, 5, strategy));
            let b = chunk_text(text, &config(25, 5, strategy));
            assert_eq!(a, b);
        }
    }
}
