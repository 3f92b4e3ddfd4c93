use lecture_scribe::chunking::{group, normalize, segment};
use proptest::prelude::*;

fn without_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Words and sentence terminators separated by assorted whitespace
fn transcript() -> impl Strategy<Value = String> {
    prop::collection::vec(("[a-zA-Zéü]{1,12}", prop::sample::select(vec![" ", "  ", "\n", ". ", "? ", "!\n", ".\t"])), 0..300)
        .prop_map(|words| words.into_iter().map(|(word, sep)| format!("{}{}", word, sep)).collect())
}

/// (max_chars, min_tail_chars) with the tail at most 60% of the maximum
fn limits() -> impl Strategy<Value = (usize, usize)> {
    (20usize..400).prop_flat_map(|max| (Just(max), 0..=(max * 6 / 10)))
}

proptest! {
    #[test]
    fn segments_reassemble_the_transcript(text in transcript(), (max, tail) in limits()) {
        let segments = segment(&text, max, tail).unwrap();
        let joined: String = segments.iter().map(|s| s.as_str()).collect();
        prop_assert_eq!(without_whitespace(&joined), without_whitespace(&text));
    }

    #[test]
    fn segments_are_consecutive_slices_of_normalized_text(text in transcript(), (max, tail) in limits()) {
        let normalized = normalize(&text);
        let segments = segment(&text, max, tail).unwrap();

        let mut rest = normalized.as_str();
        for segment in &segments {
            rest = rest.strip_prefix(' ').unwrap_or(rest);
            prop_assert!(rest.starts_with(segment.as_str()), "{:?} is not next in {:?}", segment.as_str(), rest);
            rest = &rest[segment.as_str().len()..];
        }
        prop_assert_eq!(rest, "");
    }

    #[test]
    fn segments_respect_the_size_bound(text in transcript(), (max, tail) in limits()) {
        let segments = segment(&text, max, tail).unwrap();
        if let Some((_, body)) = segments.split_last() {
            for segment in body {
                prop_assert!(segment.char_len() <= max, "{} > {}", segment.char_len(), max);
            }
        }
    }

    #[test]
    fn only_a_lone_segment_can_be_short(text in transcript(), (max, tail) in limits()) {
        let segments = segment(&text, max, tail).unwrap();
        if segments.len() > 1 {
            for segment in &segments {
                prop_assert!(segment.char_len() >= tail);
            }
        }
        for segment in &segments {
            prop_assert!(!segment.as_str().is_empty());
            prop_assert_eq!(segment.as_str(), segment.as_str().trim());
        }
    }

    #[test]
    fn batch_count_is_ceiling(text in transcript(), (max, tail) in limits(), batch_size in 1usize..12) {
        let segments = segment(&text, max, tail).unwrap();
        let batches = group(&segments, batch_size).unwrap();
        prop_assert_eq!(batches.len(), (segments.len() + batch_size - 1) / batch_size);
    }

    #[test]
    fn splitting_is_deterministic(text in transcript(), (max, tail) in limits(), batch_size in 1usize..12) {
        let first = segment(&text, max, tail).unwrap();
        let second = segment(&text, max, tail).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(group(&first, batch_size).unwrap(), group(&second, batch_size).unwrap());
    }
}
