//! Word timing resolution
//!
//! Strategies are tried in order: provider-native timing, each configured
//! transcription back-end, then an even split of the narration across the
//! script's words. A strategy that yields nothing hands over to the next, so
//! a non-empty script always comes out with a non-empty, contiguous timing.

pub mod whisper;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::speech::Narration;
use crate::timing::{make_contiguous, script_words, uniform_timings, validate, WordTiming};

pub use whisper::{OpenAiTranscriber, TranscriptionProvider, WhisperCli};

/// What a strategy gets to work with.
pub struct TimingInput<'a> {
    pub script: &'a str,
    pub narration: &'a Narration,
}

/// One way of obtaining word timings.
#[async_trait]
pub trait TimingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Timings for the narration, or an empty vec for "no result".
    async fn resolve(&self, input: &TimingInput<'_>) -> Vec<WordTiming>;
}

/// Timings the TTS provider returned with the audio.
pub struct NativeTimings;

#[async_trait]
impl TimingStrategy for NativeTimings {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn resolve(&self, input: &TimingInput<'_>) -> Vec<WordTiming> {
        input.narration.native_timings.clone().unwrap_or_default()
    }
}

/// Word boundaries from transcribing the final narration.
pub struct TranscribedTimings {
    provider: Arc<dyn TranscriptionProvider>,
}

impl TranscribedTimings {
    pub fn new(provider: Arc<dyn TranscriptionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TimingStrategy for TranscribedTimings {
    fn name(&self) -> &'static str {
        self.provider.name()
    }

    async fn resolve(&self, input: &TimingInput<'_>) -> Vec<WordTiming> {
        match self.provider.transcribe(&input.narration.audio_path).await {
            Ok(words) => words,
            Err(e) => {
                warn!(provider = self.provider.name(), "Transcription failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Even split of the duration across the script's words.
pub struct UniformTimings;

#[async_trait]
impl TimingStrategy for UniformTimings {
    fn name(&self) -> &'static str {
        "uniform"
    }

    async fn resolve(&self, input: &TimingInput<'_>) -> Vec<WordTiming> {
        uniform_timings(input.script, input.narration.duration)
    }
}

/// Timings plus the strategy that produced them.
#[derive(Debug, Clone)]
pub struct ResolvedTimings {
    pub timings: Vec<WordTiming>,
    /// `None` when the script has no words
    pub source: Option<&'static str>,
}

impl ResolvedTimings {
    /// Whether the even-split fallback was used
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.source == Some("uniform")
    }
}

pub struct TimestampResolver {
    strategies: Vec<Box<dyn TimingStrategy>>,
}

impl TimestampResolver {
    /// Native timing, then each transcriber in order, then the even split.
    pub fn new(transcribers: Vec<Arc<dyn TranscriptionProvider>>) -> Self {
        let mut strategies: Vec<Box<dyn TimingStrategy>> = vec![Box::new(NativeTimings)];
        strategies.extend(
            transcribers
                .into_iter()
                .map(|p| Box::new(TranscribedTimings::new(p)) as Box<dyn TimingStrategy>),
        );
        strategies.push(Box::new(UniformTimings));
        Self { strategies }
    }

    /// Use an explicit strategy list.
    pub fn with_strategies(strategies: Vec<Box<dyn TimingStrategy>>) -> Self {
        Self { strategies }
    }

    pub async fn resolve(&self, script: &str, narration: &Narration) -> ResolvedTimings {
        if script_words(script).is_empty() {
            debug!("Script has no words, nothing to time");
            return ResolvedTimings {
                timings: Vec::new(),
                source: None,
            };
        }

        let input = TimingInput { script, narration };
        for strategy in &self.strategies {
            let raw = strategy.resolve(&input).await;
            if raw.is_empty() {
                debug!(strategy = strategy.name(), "No timings, trying next strategy");
                continue;
            }
            if let Err(e) = validate(&raw) {
                warn!(strategy = strategy.name(), "Repairing timings: {e}");
            }

            let timings = make_contiguous(&raw, narration.duration);
            if timings.is_empty() {
                continue;
            }

            info!(strategy = strategy.name(), words = timings.len(), "Resolved word timings");
            return ResolvedTimings {
                timings,
                source: Some(strategy.name()),
            };
        }

        // Only reachable with a custom list lacking the even split
        warn!("All timing strategies came back empty, splitting evenly");
        ResolvedTimings {
            timings: uniform_timings(script, narration.duration),
            source: Some("uniform"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::path::{Path, PathBuf};

    fn narration(duration: f64, native: Option<Vec<WordTiming>>) -> Narration {
        Narration {
            audio_path: PathBuf::from("/tmp/narration.wav"),
            duration,
            native_timings: native,
            voice_id: Some("v".to_string()),
            used_fallback_voice: false,
        }
    }

    struct FixedTranscriber(Result<Vec<WordTiming>, ()>);

    #[async_trait]
    impl TranscriptionProvider for FixedTranscriber {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn transcribe(&self, _audio: &Path) -> Result<Vec<WordTiming>, ProviderError> {
            self.0
                .clone()
                .map_err(|()| ProviderError::unavailable("fixed", "down"))
        }
    }

    #[tokio::test]
    async fn test_native_timings_win() {
        let native = vec![WordTiming::new("a", 0.1, 0.5), WordTiming::new("b", 0.6, 0.9)];
        let resolver = TimestampResolver::new(vec![Arc::new(FixedTranscriber(Ok(vec![WordTiming::new("x", 0.0, 1.0)])))]);
        let resolved = resolver.resolve("a b", &narration(1.0, Some(native))).await;
        assert_eq!(resolved.source, Some("native"));
        assert_eq!(resolved.timings[0].word, "a");
        assert_eq!(resolved.timings[1].end, 1.0);
    }

    #[tokio::test]
    async fn test_empty_native_falls_through_to_transcription() {
        let resolver = TimestampResolver::new(vec![Arc::new(FixedTranscriber(Ok(vec![
            WordTiming::new("a", 0.0, 0.4),
            WordTiming::new("b", 0.4, 1.0),
        ])))]);
        let resolved = resolver.resolve("a b", &narration(1.0, Some(Vec::new()))).await;
        assert_eq!(resolved.source, Some("fixed"));
        assert!(!resolved.is_uniform());
    }

    #[tokio::test]
    async fn test_failed_transcription_falls_through_to_uniform() {
        let resolver = TimestampResolver::new(vec![Arc::new(FixedTranscriber(Err(())))]);
        let resolved = resolver.resolve("one two three four", &narration(2.0, None)).await;
        assert!(resolved.is_uniform());
        assert_eq!(resolved.timings.len(), 4);
        assert!((resolved.timings[1].start - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_script_resolves_to_nothing() {
        let resolver = TimestampResolver::new(Vec::new());
        let resolved = resolver.resolve("  ", &narration(5.0, None)).await;
        assert!(resolved.timings.is_empty());
        assert!(resolved.source.is_none());
    }

    #[tokio::test]
    async fn test_custom_list_without_uniform_still_yields_timings() {
        let resolver = TimestampResolver::with_strategies(vec![Box::new(NativeTimings)]);
        let resolved = resolver.resolve("a b c", &narration(3.0, None)).await;
        assert_eq!(resolved.timings.len(), 3);
        assert!(resolved.is_uniform());
    }
}
