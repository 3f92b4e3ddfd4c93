//! Splitting transcripts into bounded, sentence-respecting segments.
//!
//! Lengths are counted in chars so multibyte text is never cut inside a code
//! point. Both [`segment`] and [`group`] are pure functions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

pub mod batch;

pub use batch::{group, Batch};

/// A cut is only taken at a sentence terminator found at or beyond this
/// fraction of `max_chars`; earlier terminators lead to a hard cut.
pub const SENTENCE_CUT_RATIO: f64 = 0.6;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '?', '!'];

/// Invalid chunking parameters
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("max_chars must be greater than zero")]
    ZeroMaxChars,

    #[error("min_tail_chars ({min_tail_chars}) must be smaller than max_chars ({max_chars})")]
    TailTooLarge { min_tail_chars: usize, max_chars: usize },

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
}

/// One bounded piece of the normalized transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Segment(String);

impl Segment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Segment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse every whitespace run to one space and strip both ends
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into segments of at most `max_chars` chars.
///
/// Every segment is a contiguous slice of the normalized text. Segments
/// shorter than `min_tail_chars` are folded into their predecessor by widening
/// its slice, so only the last segment may end up longer than `max_chars`.
/// Input that is empty after normalization yields no segments.
pub fn segment(text: &str, max_chars: usize, min_tail_chars: usize) -> Result<Vec<Segment>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::ZeroMaxChars);
    }
    if min_tail_chars >= max_chars {
        return Err(ChunkingError::TailTooLarge {
            min_tail_chars,
            max_chars,
        });
    }

    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    let min_cut = SENTENCE_CUT_RATIO * max_chars as f64;

    let mut pieces: Vec<Range<usize>> = Vec::new();
    let mut start = 0;

    while chars.len() - start > max_chars {
        let window = &chars[start..start + max_chars];
        let cut = window
            .iter()
            .rposition(|c| SENTENCE_TERMINATORS.contains(c))
            .filter(|&pos| pos as f64 >= min_cut)
            .map(|pos| pos + 1)
            .unwrap_or(max_chars);

        push_trimmed(&mut pieces, &chars, start..start + cut);

        start += cut;
        while start < chars.len() && chars[start] == ' ' {
            start += 1;
        }
    }
    push_trimmed(&mut pieces, &chars, start..chars.len());

    Ok(merge_short_tails(pieces, min_tail_chars)
        .into_iter()
        .map(|range| Segment(chars[range].iter().collect()))
        .collect())
}

fn push_trimmed(pieces: &mut Vec<Range<usize>>, chars: &[char], mut range: Range<usize>) {
    while range.start < range.end && chars[range.start] == ' ' {
        range.start += 1;
    }
    while range.end > range.start && chars[range.end - 1] == ' ' {
        range.end -= 1;
    }
    if !range.is_empty() {
        pieces.push(range);
    }
}

// A short piece extends the previous range up to its own end, which keeps
// whatever separator the source had between them (a space or nothing).
fn merge_short_tails(pieces: Vec<Range<usize>>, min_tail_chars: usize) -> Vec<Range<usize>> {
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match merged.last_mut() {
            Some(previous) if piece.len() < min_tail_chars => previous.end = piece.end,
            _ => merged.push(piece),
        }
    }

    merged
}

/// Size statistics for a segmentation, used by the chunk preview
#[derive(Debug, Clone, Serialize)]
pub struct ChunkStats {
    pub segments: usize,
    pub batches: usize,
    pub shortest_segment: usize,
    pub longest_segment: usize,
    pub total_chars: usize,
}

impl ChunkStats {
    pub fn collect(segments: &[Segment], batches: &[Batch]) -> Self {
        let lengths: Vec<usize> = segments.iter().map(Segment::char_len).collect();
        Self {
            segments: segments.len(),
            batches: batches.len(),
            shortest_segment: lengths.iter().copied().min().unwrap_or(0),
            longest_segment: lengths.iter().copied().max().unwrap_or(0),
            total_chars: lengths.iter().sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(count: usize, sentence: &str) -> String {
        std::iter::repeat(sentence).take(count).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  hello \n\t world  \r\n"), "hello world");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert_eq!(segment("text", 0, 0), Err(ChunkingError::ZeroMaxChars));
        assert_eq!(
            segment("text", 10, 10),
            Err(ChunkingError::TailTooLarge {
                min_tail_chars: 10,
                max_chars: 10
            })
        );
    }

    #[test]
    fn test_empty_input_yields_no_segments() {
        assert!(segment(" \n ", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_segment() {
        let segments = segment("  A short lecture.  Nothing else. ", 100, 40).unwrap();
        assert_eq!(segments, vec![Segment("A short lecture. Nothing else.".to_string())]);
    }

    #[test]
    fn test_cuts_after_late_sentence_terminator() {
        // 16 chars per sentence including the trailing space separator
        let text = sentences(4, "Rust is great!!");
        let segments = segment(&text, 40, 0).unwrap();

        assert_eq!(segments[0].as_str(), "Rust is great!! Rust is great!!");
        assert!(segments.iter().all(|s| s.char_len() <= 40));
    }

    #[test]
    fn test_early_terminator_forces_hard_cut() {
        let text = format!("Hi. {}", "x".repeat(30));
        let segments = segment(&text, 20, 0).unwrap();

        assert_eq!(segments[0].char_len(), 20);
        assert_eq!(segments[0].as_str(), format!("Hi. {}", "x".repeat(16)));
    }

    #[test]
    fn test_no_terminators_hard_cuts_every_boundary() {
        let text = "a".repeat(95);
        let segments = segment(&text, 30, 0).unwrap();

        let lengths: Vec<usize> = segments.iter().map(Segment::char_len).collect();
        assert_eq!(lengths, vec![30, 30, 30, 5]);
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        let text = "b".repeat(65);
        let segments = segment(&text, 30, 10).unwrap();

        let lengths: Vec<usize> = segments.iter().map(Segment::char_len).collect();
        assert_eq!(lengths, vec![30, 35]);
        assert_eq!(segments[1].as_str(), "b".repeat(35));
    }

    #[test]
    fn test_tail_after_space_keeps_its_space() {
        // The second hard cut swallows the space before "end"; merging keeps it
        let text = format!("{} {} end", "a".repeat(20), "b".repeat(19));
        let segments = segment(&text, 20, 5).unwrap();

        assert_eq!(segments[0].as_str(), "a".repeat(20));
        assert_eq!(segments[1].as_str(), format!("{} end", "b".repeat(19)));
    }

    #[test]
    fn test_segments_are_slices_of_normalized_text() {
        let text = format!("{}  one.\n{} two {}", "q".repeat(47), "r".repeat(33), "s".repeat(8));
        let normalized = normalize(&text);
        let segments = segment(&text, 25, 10).unwrap();

        let mut rest = normalized.as_str();
        for segment in &segments {
            rest = rest.trim_start_matches(' ');
            assert!(rest.starts_with(segment.as_str()), "{:?} not at {:?}", segment, rest);
            rest = &rest[segment.as_str().len()..];
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn test_lone_short_segment_is_kept() {
        let segments = segment("tiny", 30, 10).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "é".repeat(25);
        let segments = segment(&text, 10, 0).unwrap();

        let lengths: Vec<usize> = segments.iter().map(Segment::char_len).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn test_seven_thousand_char_lecture() {
        // 140 sentences of 50 chars each, a little over 7000 chars in total
        let sentence = "The lecturer explains ownership and borrowing now.";
        assert_eq!(sentence.len(), 50);
        let text = sentences(140, sentence);

        let segments = segment(&text, 3000, 400).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(segments[0].char_len() <= 3000 && segments[0].char_len() >= 1800);
        assert!(segments[1].char_len() <= 3000 && segments[1].char_len() >= 1800);
        assert!(segments[2].char_len() >= 400);
        assert!(segments[0].as_str().ends_with('.'));
        assert!(segments[1].as_str().ends_with('.'));

        let batches = group(&segments, 10).unwrap();
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_chunk_stats() {
        let segments = segment(&"c".repeat(70), 30, 0).unwrap();
        let batches = group(&segments, 2).unwrap();
        let stats = ChunkStats::collect(&segments, &batches);

        assert_eq!(stats.segments, 3);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.shortest_segment, 10);
        assert_eq!(stats.longest_segment, 30);
        assert_eq!(stats.total_chars, 70);
    }
}
