//! Karaoke caption compilation
//!
//! Words are split into fixed-size groups. Every word produces one event
//! covering its own time window and showing its whole group, with that word
//! highlighted, so the highlight sweeps left to right while the phrase stays
//! on screen.

pub mod ass;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::timing::{make_contiguous, script_words, track_duration, uniform_timings, CaptionEvent, WordTiming};

pub use ass::{format_ass_time, AssWriter, SubtitleStyle};

/// A compiled caption track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub events: Vec<CaptionEvent>,
    pub duration: f64,
}

impl CaptionTrack {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubtitleCompiler {
    group_size: usize,
}

impl Default for SubtitleCompiler {
    fn default() -> Self {
        Self { group_size: 4 }
    }
}

impl SubtitleCompiler {
    /// Compiler with `group_size` words per phrase (minimum 1)
    #[must_use]
    pub fn new(group_size: usize) -> Self {
        Self {
            group_size: group_size.max(1),
        }
    }

    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Compile timings for `script` into a caption track.
    ///
    /// An empty script gives an empty track. Empty timings for a non-empty
    /// script are replaced by an even split of `duration`.
    #[must_use]
    pub fn compile(&self, timings: &[WordTiming], script: &str, duration: f64) -> CaptionTrack {
        let duration = track_duration(duration);
        if script_words(script).is_empty() {
            return CaptionTrack {
                events: Vec::new(),
                duration,
            };
        }

        let mut words = make_contiguous(timings, duration);
        if words.is_empty() {
            warn!("No word timings for non-empty script, splitting evenly");
            words = uniform_timings(script, duration);
        }

        let mut events = Vec::with_capacity(words.len());
        for group in words.chunks(self.group_size) {
            let phrase: Vec<String> = group.iter().map(|w| w.word.clone()).collect();
            for (highlight, word) in group.iter().enumerate() {
                events.push(CaptionEvent {
                    start: word.start,
                    end: word.end,
                    words: phrase.clone(),
                    highlight,
                });
            }
        }

        debug!(events = events.len(), groups = events.len().div_ceil(self.group_size), "Compiled captions");
        CaptionTrack { events, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings(words: &[&str], step: f64) -> Vec<WordTiming> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| WordTiming::new(*w, i as f64 * step, (i + 1) as f64 * step))
            .collect()
    }

    #[test]
    fn test_one_event_per_word_in_groups_of_four() {
        let words = ["Hello", "world", "this", "is", "a", "test"];
        let track = SubtitleCompiler::default().compile(&timings(&words, 0.5), &words.join(" "), 3.0);

        assert_eq!(track.events.len(), 6);
        assert_eq!(track.events[0].words, vec!["Hello", "world", "this", "is"]);
        assert_eq!(track.events[3].highlight, 3);
        assert_eq!(track.events[4].words, vec!["a", "test"]);
        assert_eq!(track.events[5].highlight, 1);
        assert_eq!(track.events[5].highlighted_word(), Some("test"));
    }

    #[test]
    fn test_negative_or_nan_duration_gives_zero_length_track() {
        let compiler = SubtitleCompiler::default();
        for duration in [-1.0, f64::NAN] {
            let track = compiler.compile(&[WordTiming::new("a", 0.0, 1.0)], "a", duration);
            assert_eq!(track.duration, 0.0);
            assert_eq!(track.events.len(), 1);
            assert_eq!(track.events[0].end, 0.0);
        }
    }

    #[test]
    fn test_windows_are_disjoint_and_cover_duration() {
        let words = ["one", "two", "three", "four", "five", "six", "seven"];
        let mut t = timings(&words, 0.4);
        t[3].end = 2.5; // runs past the next word
        t[5].start = 2.3; // gap after "five"
        let track = SubtitleCompiler::default().compile(&t, &words.join(" "), 3.0);

        assert_eq!(track.events.first().map(|e| e.start), Some(0.0));
        assert_eq!(track.events.last().map(|e| e.end), Some(3.0));
        for pair in track.events.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
            assert!(pair[0].start <= pair[0].end);
        }
    }

    #[test]
    fn test_empty_script_gives_empty_track() {
        let track = SubtitleCompiler::default().compile(&timings(&["x"], 1.0), "", 4.0);
        assert!(track.is_empty());
        assert!((track.duration - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_timings_fall_back_to_even_split() {
        let track = SubtitleCompiler::default().compile(&[], "one two three four five six", 3.0);
        assert_eq!(track.events.len(), 6);
        let total: f64 = track.events.iter().map(|e| e.end - e.start).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_size_is_configurable() {
        let words = ["a", "b", "c", "d", "e"];
        let track = SubtitleCompiler::new(2).compile(&timings(&words, 1.0), "a b c d e", 5.0);
        let sizes: Vec<usize> = track.events.iter().map(|e| e.words.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 2, 1]);
        assert_eq!(SubtitleCompiler::new(0).group_size(), 1);
    }
}
