//! Word timing and caption event value types
//!
//! Times are seconds from the start of the narration track.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One spoken word and its window in the narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    #[must_use]
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }

    /// Length of the word's window in seconds
    #[must_use]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Return a copy with both edges divided by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            word: self.word.clone(),
            start: self.start / factor,
            end: self.end / factor,
        }
    }
}

/// One timed caption: the whole phrase, with exactly one word highlighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEvent {
    pub start: f64,
    pub end: f64,
    pub words: Vec<String>,
    pub highlight: usize,
}

impl CaptionEvent {
    /// The highlighted word
    #[must_use]
    pub fn highlighted_word(&self) -> Option<&str> {
        self.words.get(self.highlight).map(String::as_str)
    }
}

/// Split script text into the words that will be spoken and captioned.
#[must_use]
pub fn script_words(script: &str) -> Vec<&str> {
    script.split_whitespace().collect()
}

/// Clamp a track length to a finite, non-negative value.
///
/// Negative and non-finite lengths become zero.
#[must_use]
pub fn track_duration(duration: f64) -> f64 {
    if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    }
}

/// Evenly divide `duration` across the words of `script`.
///
/// The last word always ends exactly at `duration`.
#[must_use]
pub fn uniform_timings(script: &str, duration: f64) -> Vec<WordTiming> {
    let words = script_words(script);
    if words.is_empty() {
        return Vec::new();
    }

    let duration = track_duration(duration);
    let count = words.len();
    let step = duration / count as f64;

    words
        .into_iter()
        .enumerate()
        .map(|(i, word)| {
            let start = i as f64 * step;
            let end = if i + 1 == count {
                duration
            } else {
                (i + 1) as f64 * step
            };
            WordTiming::new(word, start, end)
        })
        .collect()
}

/// Check that a timing sequence is usable as-is.
pub fn validate(timings: &[WordTiming]) -> Result<(), ValidationError> {
    if timings.is_empty() {
        return Err(ValidationError::EmptyTiming);
    }

    let mut previous_start = f64::NEG_INFINITY;
    for (index, t) in timings.iter().enumerate() {
        if !t.start.is_finite() || !t.end.is_finite() || t.start < 0.0 || t.end < t.start {
            return Err(ValidationError::InvalidWindow {
                index,
                start: t.start,
                end: t.end,
            });
        }
        if t.start < previous_start {
            return Err(ValidationError::OutOfOrder { index });
        }
        previous_start = t.start;
    }

    Ok(())
}

/// Make a timing sequence contiguous over `[0, duration]`.
///
/// Words with blank text or non-finite edges are dropped, the rest are
/// ordered by start time and clamped to the track. Every word then ends where
/// the next one starts, the first word starts at zero and the last word ends
/// at `duration`, so consecutive caption windows never overlap or leave gaps.
#[must_use]
pub fn make_contiguous(timings: &[WordTiming], duration: f64) -> Vec<WordTiming> {
    let duration = track_duration(duration);
    let mut words: Vec<WordTiming> = timings
        .iter()
        .filter(|t| !t.word.trim().is_empty() && t.start.is_finite() && t.end.is_finite())
        .map(|t| WordTiming::new(t.word.trim(), t.start.clamp(0.0, duration), t.end.clamp(0.0, duration)))
        .collect();

    words.sort_by(|a, b| a.start.total_cmp(&b.start));

    let count = words.len();
    for i in 0..count {
        if i == 0 {
            words[i].start = 0.0;
        }
        words[i].end = if i + 1 < count {
            words[i + 1].start.max(words[i].start)
        } else {
            duration.max(words[i].start)
        };
    }

    words
}
