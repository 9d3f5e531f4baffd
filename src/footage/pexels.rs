//! Pexels video search

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::scoring::{FootageCandidate, Rendition};
use super::{FootageProvider, Orientation};
use crate::config::FootageConfig;
use crate::error::{DownloadError, ProviderError};
use crate::http_client::{build_client, check_status, download};

const PROVIDER: &str = "pexels";

pub struct PexelsProvider {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    min_duration: u32,
}

impl PexelsProvider {
    pub fn new(config: &FootageConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(PROVIDER)?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            min_duration: config.min_duration_secs.ceil() as u32,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    id: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    video_files: Vec<PexelsFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsFile {
    link: String,
    quality: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
}

impl From<PexelsVideo> for FootageCandidate {
    fn from(v: PexelsVideo) -> Self {
        Self {
            id: v.id.to_string(),
            source_url: v.url,
            width: v.width,
            height: v.height,
            duration: v.duration,
            renditions: v
                .video_files
                .into_iter()
                .map(|f| Rendition {
                    url: f.link,
                    width: f.width.unwrap_or(0),
                    height: f.height.unwrap_or(0),
                    fps: f.fps,
                    quality: f.quality,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl FootageProvider for PexelsProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        orientation: Orientation,
        page_size: usize,
    ) -> Result<Vec<FootageCandidate>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            provider: PROVIDER,
            message: "PEXELS_API_KEY is not set".to_string(),
        })?;

        let response = self
            .client
            .get(format!("{}/videos/search", self.api_base))
            .header("Authorization", api_key)
            .query(&[
                ("query", query.to_string()),
                ("orientation", orientation.as_str().to_string()),
                ("size", "large".to_string()),
                ("per_page", page_size.to_string()),
                ("min_duration", self.min_duration.to_string()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        let response = check_status(PROVIDER, response).await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;

        debug!(results = parsed.videos.len(), "Search complete");
        Ok(parsed.videos.into_iter().map(FootageCandidate::from).collect())
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        download(&self.client, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_maps_to_candidates() {
        let json = r#"{
            "page": 1,
            "per_page": 2,
            "videos": [{
                "id": 857251,
                "width": 1080,
                "height": 1920,
                "url": "https://www.pexels.com/video/857251/",
                "duration": 12,
                "video_files": [
                    {"id": 1, "quality": "hd", "file_type": "video/mp4", "width": 1080, "height": 1920, "fps": 29.97, "link": "https://player.example/hd.mp4"},
                    {"id": 2, "quality": null, "file_type": "video/mp4", "width": null, "height": null, "fps": null, "link": "https://player.example/hls.m3u8"}
                ]
            }]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let candidates: Vec<FootageCandidate> = parsed.videos.into_iter().map(FootageCandidate::from).collect();

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.id, "857251");
        assert!((c.duration - 12.0).abs() < f64::EPSILON);
        assert_eq!(c.renditions.len(), 2);
        assert_eq!(c.renditions[0].quality.as_deref(), Some("hd"));
        assert_eq!(c.renditions[1].width, 0);
    }

    #[test]
    fn test_empty_search_response() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"page":1}"#).unwrap();
        assert!(parsed.videos.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_key_is_not_configured() {
        let provider = PexelsProvider::new(&FootageConfig::default()).unwrap();
        let err = provider.search("sunset", Orientation::Portrait, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }
}
