//! # Track Analysis Pipeline
//!
//! End-to-end processing of one GPX document against a region store:
//!
//! ```text
//! parse → time-gap segmentation → pattern analysis → drop trivial segments → attribution
//! ```
//!
//! Every document is independent; the only shared state is the read-only
//! [`RegionStore`], so batches can be fanned out freely.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::attribution::{attribute_segments, AttributedSegment, AttributionMode};
use crate::error::{GeofenceError, Result};
use crate::gpx::parse_gpx;
use crate::segmentation::{split_into_segments, SegmentConfig};
use crate::store::{RegionStore, OUTSIDE_KEY};

/// Configuration for [`analyze_track`].
#[derive(Debug, Clone)]
pub struct TrackAnalysisConfig {
    pub segment: SegmentConfig,
    pub attribution: AttributionMode,
    /// Segments with fewer points are dropped.
    /// Default: 2
    pub min_points: usize,
    /// Segments shorter than this are dropped.
    /// Default: 0.001 km
    pub min_distance_km: f64,
    /// Attach a [`PatternAnalysis`](crate::PatternAnalysis) to each segment.
    /// Default: true
    pub analyze_patterns: bool,
}

impl Default for TrackAnalysisConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            attribution: AttributionMode::default(),
            min_points: 2,
            min_distance_km: 0.001,
            analyze_patterns: true,
        }
    }
}

/// Result of analyzing one track document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    pub name: Option<String>,
    /// Points in the document, including those of dropped segments
    pub total_points: usize,
    /// Distance over kept segments
    pub total_distance_km: f64,
    pub skipped_segments: usize,
    pub segments: Vec<AttributedSegment>,
    /// Kept distance per region id; unattributed distance under `"outside"`
    pub distance_by_region: HashMap<String, f64>,
}

impl TrackReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GeofenceError::ConfigError {
            message: format!("failed to serialize track report: {}", e),
        })
    }

    /// Ids of regions the track touched, sorted.
    pub fn region_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .distance_by_region
            .keys()
            .map(String::as_str)
            .filter(|id| *id != OUTSIDE_KEY)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Analyze one GPX document.
///
/// Malformed documents fail as a whole; nothing partial is returned.
pub fn analyze_track(
    xml: &str,
    store: &RegionStore,
    config: &TrackAnalysisConfig,
) -> Result<TrackReport> {
    let gpx = parse_gpx(xml)?;
    let total_points = gpx.point_count();

    let mut segments = split_into_segments(&gpx, config.segment.max_gap);
    let before = segments.len();
    segments.retain(|s| s.len() >= config.min_points && s.distance_km >= config.min_distance_km);
    let skipped_segments = before - segments.len();
    if skipped_segments > 0 {
        debug!("[Pipeline] Dropped {} trivial segments", skipped_segments);
    }

    if config.analyze_patterns {
        segments = segments
            .into_iter()
            .map(|s| s.with_pattern_analysis())
            .collect();
    }

    let segments = attribute_segments(store, segments, config.attribution);

    let mut distance_by_region: HashMap<String, f64> = HashMap::new();
    for s in &segments {
        let key = s.region_id.as_deref().unwrap_or(OUTSIDE_KEY);
        *distance_by_region.entry(key.to_string()).or_default() += s.segment.distance_km;
    }
    let total_distance_km = segments.iter().map(|s| s.segment.distance_km).sum();

    let report = TrackReport {
        name: gpx.display_name().map(str::to_string),
        total_points,
        total_distance_km,
        skipped_segments,
        segments,
        distance_by_region,
    };

    info!(
        "[Pipeline] Analyzed track {:?}: {} points, {} segments, {:.2} km",
        report.name,
        report.total_points,
        report.segments.len(),
        report.total_distance_km
    );
    Ok(report)
}

/// Analyze many documents independently; results keep input order.
pub fn analyze_tracks<S: AsRef<str>>(
    documents: &[S],
    store: &RegionStore,
    config: &TrackAnalysisConfig,
) -> Vec<Result<TrackReport>> {
    documents
        .iter()
        .map(|doc| analyze_track(doc.as_ref(), store, config))
        .collect()
}

/// Parallel [`analyze_tracks`] with rayon; results keep input order.
#[cfg(feature = "parallel")]
pub fn analyze_tracks_parallel<S: AsRef<str> + Sync>(
    documents: &[S],
    store: &RegionStore,
    config: &TrackAnalysisConfig,
) -> Vec<Result<TrackReport>> {
    use rayon::prelude::*;

    documents
        .par_iter()
        .map(|doc| analyze_track(doc.as_ref(), store, config))
        .collect()
}
