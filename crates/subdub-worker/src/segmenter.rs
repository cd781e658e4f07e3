//! Grouping of timed words into subtitle segments.
//!
//! Single pass, O(n). Every input word lands in exactly one segment and the
//! segments preserve source order.

use subdub_models::{Segment, Word};

/// Break limits for dynamic segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// Close a segment once it holds this many words
    pub max_words: usize,
    /// Close a segment once it spans this many seconds
    pub max_duration: f64,
    /// Close a segment before a silence at least this long
    pub min_pause: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_words: 15,
            max_duration: 7.0,
            min_pause: 0.5,
        }
    }
}

/// Break policy for one segmentation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentPolicy {
    /// Break only when a segment reaches the given duration
    Fixed(f64),
    /// Break on word count, duration, sentence end or pause
    Dynamic,
}

impl SegmentPolicy {
    pub fn new(fixed: bool, fixed_duration: f64) -> Self {
        if fixed {
            SegmentPolicy::Fixed(fixed_duration)
        } else {
            SegmentPolicy::Dynamic
        }
    }
}

/// Word segmenter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split `words` into segments. An empty input yields no segments.
    pub fn segment(&self, words: &[Word], policy: SegmentPolicy) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current: Vec<Word> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            current.push(word.clone());

            let next = words.get(i + 1);
            if self.should_break(&current, word, next, policy) {
                segments.extend(Segment::from_words(std::mem::take(&mut current)));
            }
        }

        segments.extend(Segment::from_words(current));
        segments
    }

    fn should_break(
        &self,
        current: &[Word],
        word: &Word,
        next: Option<&Word>,
        policy: SegmentPolicy,
    ) -> bool {
        let Some(first) = current.first() else {
            return false;
        };
        let duration = word.end - first.start;

        match policy {
            SegmentPolicy::Fixed(limit) => duration >= limit,
            SegmentPolicy::Dynamic => {
                current.len() >= self.config.max_words
                    || duration >= self.config.max_duration
                    || ends_sentence(&word.text)
                    || next.is_some_and(|n| n.start - word.end >= self.config.min_pause)
            }
        }
    }
}

/// Whether `text` ends with `.`, `!` or `?` after trimming whitespace.
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?'])
}

/// Segment with the default limits.
pub fn segment(words: &[Word], fixed: bool, fixed_duration: f64) -> Vec<Segment> {
    Segmenter::default().segment(words, SegmentPolicy::new(fixed, fixed_duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic word stream with varied lengths, pauses and punctuation.
    fn generated_words(seed: u64, count: usize) -> Vec<Word> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };

        let mut t = 0.0;
        (0..count)
            .map(|i| {
                t += if next() < 0.15 { 0.3 + next() * 1.5 } else { next() * 0.2 };
                let start = t;
                t += 0.1 + next() * 0.8;
                let text = match next() {
                    r if r < 0.08 => format!("word{i}."),
                    r if r < 0.10 => format!("word{i}?"),
                    _ => format!("word{i}"),
                };
                Word::new(text, start, t)
            })
            .collect()
    }

    fn flatten(segments: &[Segment]) -> Vec<Word> {
        segments.iter().flat_map(|s| s.words.iter().cloned()).collect()
    }

    #[test]
    fn test_hello_world_sentence() {
        let words = vec![Word::new("Hello", 0.0, 0.5), Word::new("world.", 0.5, 1.0)];
        let segments = segment(&words, false, 7.0);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hello world.");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(segment(&[], false, 7.0).is_empty());
        assert!(segment(&[], true, 7.0).is_empty());
    }

    #[test]
    fn test_segments_partition_input() {
        for seed in 0..20 {
            let words = generated_words(seed, 300);
            for fixed in [false, true] {
                let segments = segment(&words, fixed, 4.0);
                assert_eq!(flatten(&segments), words, "seed {seed}, fixed {fixed}");
                assert!(segments.iter().all(|s| !s.words.is_empty()));
            }
        }
    }

    #[test]
    fn test_fixed_segments_reach_duration() {
        for seed in 0..20 {
            let words = generated_words(seed, 200);
            let segments = segment(&words, true, 5.0);
            let (last, rest) = segments.split_last().unwrap();
            assert!(!last.words.is_empty());
            for s in rest {
                assert!(s.duration() >= 5.0, "segment {:?} too short", s.text);
            }
        }
    }

    #[test]
    fn test_fixed_mode_ignores_punctuation_and_pauses() {
        let words = vec![
            Word::new("One.", 0.0, 0.5),
            Word::new("Two!", 2.0, 2.5),
            Word::new("Three", 2.6, 3.0),
        ];
        let segments = segment(&words, true, 10.0);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_dynamic_segments_respect_limits() {
        let config = SegmenterConfig::default();
        for seed in 0..20 {
            let words = generated_words(seed, 400);
            let segments = segment(&words, false, 7.0);
            for s in &segments {
                assert!(s.word_count() <= config.max_words);
                // Only the closing word may carry the segment to the limit.
                let (last, head) = s.words.split_last().unwrap();
                for w in head {
                    assert!(
                        w.end - s.start < config.max_duration,
                        "{} reached the limit before {}",
                        s.text,
                        last.text
                    );
                }
            }
        }
    }

    #[test]
    fn test_duration_break_happens_after_the_word() {
        let words = vec![Word::new("long", 0.0, 6.0), Word::new("tail", 6.0, 7.5)];
        let segments = segment(&words, false, 7.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "long tail");
        assert_eq!(segments[0].end, 7.5);
    }

    #[test]
    fn test_segment_closes_once_duration_reached() {
        let words = vec![
            Word::new("a", 0.0, 3.0),
            Word::new("b", 3.0, 7.2),
            Word::new("c", 7.2, 7.4),
        ];
        let texts: Vec<String> = segment(&words, false, 7.0)
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, ["a b", "c"]);
    }

    #[test]
    fn test_dynamic_breaks_on_word_count() {
        let words: Vec<Word> = (0..20)
            .map(|i| Word::new(format!("w{i}"), i as f64 * 0.2, i as f64 * 0.2 + 0.15))
            .collect();
        let segments = segment(&words, false, 7.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].word_count(), 15);
        assert_eq!(segments[1].word_count(), 5);
    }

    #[test]
    fn test_dynamic_breaks_on_pause() {
        let words = vec![
            Word::new("before", 0.0, 0.4),
            Word::new("pause", 0.4, 0.8),
            Word::new("after", 1.3, 1.6),
        ];
        let segments = segment(&words, false, 7.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "before pause");
        assert_eq!(segments[1].text, "after");
    }

    #[test]
    fn test_punctuation_is_checked_after_trimming() {
        assert!(ends_sentence("done. "));
        assert!(ends_sentence("really?"));
        assert!(ends_sentence("wow!\n"));
        assert!(!ends_sentence("etc,"));
        assert!(!ends_sentence(""));
    }

    #[test]
    fn test_custom_limits() {
        let segmenter = Segmenter::new(SegmenterConfig {
            max_words: 2,
            ..Default::default()
        });
        let words: Vec<Word> = (0..5)
            .map(|i| Word::new("x", i as f64 * 0.1, i as f64 * 0.1 + 0.05))
            .collect();
        let sizes: Vec<usize> = segmenter
            .segment(&words, SegmentPolicy::Dynamic)
            .iter()
            .map(Segment::word_count)
            .collect();
        assert_eq!(sizes, [2, 2, 1]);
    }
}
