//! Deterministic footage quality scoring
//!
//! Everything here is a pure function of candidate metadata, so identical
//! search results always rank identically.

use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;

/// One downloadable encode of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    /// Provider quality label (`hd`, `sd`, `uhd`)
    pub quality: Option<String>,
}

impl Rendition {
    #[must_use]
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// A stock clip returned by a footage search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootageCandidate {
    pub id: String,
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    /// Seconds
    pub duration: f64,
    pub renditions: Vec<Rendition>,
}

/// A candidate that passed filtering, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: FootageCandidate,
    pub score: u32,
}

/// Minimums a candidate must meet before it is ranked.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub min_duration: f64,
    pub min_score: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_duration: 5.0,
            min_score: 3,
        }
    }
}

/// The mid resolution tier is two thirds of the canvas (720x1280 for 1080x1920).
fn mid_tier(canvas: &CanvasConfig) -> (u32, u32) {
    (canvas.width * 2 / 3, canvas.height * 2 / 3)
}

/// Score a candidate from duration, resolution and rendition count.
#[must_use]
pub fn candidate_score(candidate: &FootageCandidate, canvas: &CanvasConfig) -> u32 {
    let mut score = 0;

    if (5.0..=15.0).contains(&candidate.duration) {
        score += 2;
    } else if candidate.duration > 15.0 {
        score += 1;
    }

    let (mid_w, mid_h) = mid_tier(canvas);
    if candidate.width >= canvas.width || candidate.height >= canvas.height {
        score += 3;
    } else if candidate.width >= mid_w || candidate.height >= mid_h {
        score += 1;
    }

    if candidate.renditions.len() >= 3 {
        score += 1;
    }

    score
}

/// Whether a candidate may be used at all.
///
/// Too-short clips and clips without renditions are out regardless of score.
#[must_use]
pub fn is_acceptable(candidate: &FootageCandidate, score: u32, thresholds: Thresholds) -> bool {
    candidate.duration >= thresholds.min_duration
        && !candidate.renditions.is_empty()
        && score >= thresholds.min_score
}

/// Filter, score and order candidates, keeping at most `budget` distinct ones.
///
/// Ties keep search order.
#[must_use]
pub fn rank_candidates(
    candidates: &[FootageCandidate],
    canvas: &CanvasConfig,
    thresholds: Thresholds,
    budget: usize,
) -> Vec<ScoredCandidate> {
    let mut seen = std::collections::HashSet::new();
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| seen.insert(c.id.as_str()))
        .filter_map(|c| {
            let score = candidate_score(c, canvas);
            is_acceptable(c, score, thresholds).then(|| ScoredCandidate {
                candidate: c.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(budget);
    scored
}

/// Score a portrait rendition; `None` for landscape or square encodes.
#[must_use]
pub fn rendition_score(rendition: &Rendition, canvas: &CanvasConfig) -> Option<u32> {
    if !rendition.is_portrait() {
        return None;
    }

    let mut score = 0;
    let (mid_w, mid_h) = mid_tier(canvas);
    if rendition.width >= canvas.width && rendition.height >= canvas.height {
        score += 10;
    } else if rendition.width >= mid_w && rendition.height >= mid_h {
        score += 5;
    }

    match rendition.quality.as_deref() {
        Some("hd") => score += 5,
        Some("sd") => score += 2,
        _ => {}
    }

    // Missing frame rate is assumed to be 30
    if rendition.fps.unwrap_or(30.0) >= 30.0 {
        score += 2;
    }

    Some(score)
}

/// Best portrait rendition of a candidate; the first one wins ties.
#[must_use]
pub fn best_rendition<'a>(candidate: &'a FootageCandidate, canvas: &CanvasConfig) -> Option<&'a Rendition> {
    let mut best: Option<(&Rendition, u32)> = None;
    for rendition in &candidate.renditions {
        if let Some(score) = rendition_score(rendition, canvas) {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((rendition, score));
            }
        }
    }
    best.map(|(r, _)| r)
}
