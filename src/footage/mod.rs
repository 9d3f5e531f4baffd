//! Stock footage acquisition
//!
//! Searches the provider, ranks what comes back and downloads the best
//! portrait rendition of each selected clip with bounded concurrency. Search
//! failures and single download failures never fail the job; the worst case
//! is an empty clip list, which the assembler turns into a solid background.

pub mod pexels;
pub mod scoring;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::config::{CanvasConfig, FootageConfig};
use crate::error::{DownloadError, ProviderError};

pub use pexels::PexelsProvider;
pub use scoring::{FootageCandidate, Rendition, ScoredCandidate, Thresholds};

/// Requested frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
}

impl Orientation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
        }
    }
}

/// Stock footage search and download.
#[async_trait]
pub trait FootageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        orientation: Orientation,
        page_size: usize,
    ) -> Result<Vec<FootageCandidate>, ProviderError>;

    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError>;
}

/// Clips on disk plus the query that found them.
#[derive(Debug, Clone, Default)]
pub struct FootageSelection {
    pub query: String,
    pub clips: Vec<PathBuf>,
}

pub struct FootageStage {
    provider: Arc<dyn FootageProvider>,
    config: FootageConfig,
    canvas: CanvasConfig,
    rotation: AtomicUsize,
}

impl FootageStage {
    pub fn new(provider: Arc<dyn FootageProvider>, config: FootageConfig, canvas: CanvasConfig) -> Self {
        Self {
            provider,
            config,
            canvas,
            rotation: AtomicUsize::new(0),
        }
    }

    /// Number of clips to select for `duration` seconds of video.
    #[must_use]
    pub fn clip_budget(&self, duration: f64) -> usize {
        let unit = if self.config.unit_clip_secs > 0.0 {
            self.config.unit_clip_secs
        } else {
            2.5
        };
        (duration.max(0.0) / unit).ceil() as usize + self.config.slack
    }

    /// Raw results to request for a budget.
    #[must_use]
    pub fn page_size(&self, budget: usize) -> usize {
        (budget * self.config.overfetch.max(1)).clamp(1, self.config.max_page_size.max(1))
    }

    /// Pick the search query.
    ///
    /// An explicit query gets the stylistic suffix. No query, a blank one or
    /// a generic placeholder rotates through the themed set instead.
    pub fn select_query(&self, explicit: Option<&str>) -> String {
        let explicit = explicit
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .filter(|q| !self.config.generic_queries.iter().any(|g| g.eq_ignore_ascii_case(q)));

        if let Some(query) = explicit {
            if self.config.query_suffix.is_empty() {
                return query.to_string();
            }
            return format!("{query} {}", self.config.query_suffix);
        }

        let themed = &self.config.themed_queries;
        if themed.is_empty() {
            return self.config.query_suffix.clone();
        }
        let next = self.rotation.fetch_add(1, Ordering::Relaxed);
        themed[next % themed.len()].clone()
    }

    /// Search, rank and download clips for a video of `duration` seconds.
    #[instrument(skip(self, work_dir), fields(provider = self.provider.name()))]
    pub async fn run(&self, duration: f64, query: Option<&str>, work_dir: &Path) -> FootageSelection {
        let query = self.select_query(query);
        let budget = self.clip_budget(duration);
        let page_size = self.page_size(budget);
        info!(%query, budget, page_size, "Searching footage");

        let candidates = match self.provider.search(&query, Orientation::Portrait, page_size).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Footage search failed, continuing without clips: {e}");
                return FootageSelection {
                    query,
                    clips: Vec::new(),
                };
            }
        };

        let thresholds = Thresholds {
            min_duration: self.config.min_duration_secs,
            min_score: self.config.min_score,
        };
        let ranked = scoring::rank_candidates(&candidates, &self.canvas, thresholds, budget);
        info!(
            results = candidates.len(),
            accepted = ranked.len(),
            "Ranked footage candidates"
        );

        let downloads: Vec<(usize, String)> = ranked
            .iter()
            .filter_map(|s| scoring::best_rendition(&s.candidate, &self.canvas).map(|r| r.url.clone()))
            .enumerate()
            .collect();

        let concurrency = self.config.download_concurrency.max(1);
        let results: Vec<Result<PathBuf, DownloadError>> = stream::iter(downloads)
            .map(|(index, url)| {
                let path = work_dir.join(format!("clip_{index:02}.mp4"));
                async move {
                    let body = self.provider.fetch(&url).await?;
                    tokio::fs::write(&path, &body).await?;
                    Ok::<_, DownloadError>(path)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut clips = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(path) => clips.push(path),
                Err(e) => warn!("Skipping clip: {e}"),
            }
        }

        info!(clips = clips.len(), "Footage ready");
        FootageSelection { query, clips }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoFootage;

    #[async_trait]
    impl FootageProvider for NoFootage {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn search(&self, _: &str, _: Orientation, _: usize) -> Result<Vec<FootageCandidate>, ProviderError> {
            Err(ProviderError::unavailable("none", "offline"))
        }

        async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
            Err(DownloadError::Empty { url: url.to_string() })
        }
    }

    fn stage() -> FootageStage {
        FootageStage::new(Arc::new(NoFootage), FootageConfig::default(), CanvasConfig::default())
    }

    #[test]
    fn test_clip_budget() {
        let s = stage();
        assert_eq!(s.clip_budget(10.0), 6);
        assert_eq!(s.clip_budget(11.0), 7);
        assert_eq!(s.clip_budget(0.0), 2);
    }

    #[test]
    fn test_page_size_overfetches_and_caps() {
        let s = stage();
        assert_eq!(s.page_size(6), 18);
        assert_eq!(s.page_size(20), 40);
    }

    #[test]
    fn test_explicit_query_gets_suffix() {
        let s = stage();
        assert_eq!(s.select_query(Some("ocean waves")), "ocean waves cinematic golden hour");
    }

    #[test]
    fn test_generic_query_rotates_themes() {
        let s = stage();
        let first = s.select_query(Some("spirituality faith peaceful"));
        let second = s.select_query(None);
        let third = s.select_query(Some("   "));
        assert_eq!(first, crate::config::THEMED_QUERIES[0]);
        assert_eq!(second, crate::config::THEMED_QUERIES[1]);
        assert_eq!(third, crate::config::THEMED_QUERIES[2]);
    }

    #[tokio::test]
    async fn test_search_failure_yields_no_clips() {
        let dir = tempfile::tempdir().unwrap();
        let selection = stage().run(10.0, None, dir.path()).await;
        assert!(selection.clips.is_empty());
        assert!(!selection.query.is_empty());
    }
}
