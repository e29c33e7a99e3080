//! # Time-Gap Segmentation
//!
//! Splits a point sequence into maximal runs whose timestamps stay within a
//! maximum gap of the run's anchor (its first timestamped point), and reduces
//! each run to a [`Segment`] with distance, duration, speed and movement mode.
//!
//! Points without a timestamp never split a run; they are appended to the
//! current one.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::classify::{analyze_points, classify_movement, MovementType, PatternAnalysis};
use crate::geo_utils::polyline_length_km;
use crate::gpx::ParsedGpx;
use crate::GeoPoint;

/// Gap used when none (or a non-positive one) is configured.
pub const DEFAULT_MAX_GAP_MINUTES: i64 = 30;

/// Configuration for time-gap segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentConfig {
    /// Largest allowed distance in time from a segment's anchor point.
    /// Zero or negative means the default.
    /// Default: 30 minutes
    pub max_gap: Duration,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_gap: Duration::minutes(DEFAULT_MAX_GAP_MINUTES),
        }
    }
}

impl SegmentConfig {
    pub fn with_max_gap_minutes(minutes: i64) -> Self {
        Self {
            max_gap: Duration::minutes(minutes),
        }
    }

    /// The configured gap, with non-positive values replaced by the default.
    pub fn effective_max_gap(&self) -> Duration {
        effective_gap(self.max_gap)
    }
}

fn effective_gap(max_gap: Duration) -> Duration {
    if max_gap <= Duration::zero() {
        Duration::minutes(DEFAULT_MAX_GAP_MINUTES)
    } else {
        max_gap
    }
}

/// A time-contiguous run of points with derived statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<GeoPoint>,
    /// First known timestamp
    pub start_time: Option<DateTime<Utc>>,
    /// Last known timestamp
    pub end_time: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub avg_speed_kmh: f64,
    pub movement_type: MovementType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analysis: Option<PatternAnalysis>,
}

impl Segment {
    /// Reduce a point run to a segment.
    pub fn from_points(points: Vec<GeoPoint>) -> Self {
        let start_time = points.iter().find_map(|p| p.time);
        let end_time = points.iter().rev().find_map(|p| p.time);
        let distance_km = calculate_distance_km(&points);
        let avg_speed_kmh = calculate_speed_kmh(&points);

        Self {
            points,
            start_time,
            end_time,
            distance_km,
            avg_speed_kmh,
            movement_type: classify_movement(avg_speed_kmh),
            analysis: None,
        }
    }

    /// Attach a [`PatternAnalysis`] of this segment's points.
    pub fn with_pattern_analysis(mut self) -> Self {
        self.analysis = Some(analyze_points(&self.points));
        self
    }

    /// Elapsed time between first and last known timestamps.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Total haversine length of the run in kilometers.
pub fn calculate_distance_km(points: &[GeoPoint]) -> f64 {
    polyline_length_km(points)
}

/// Average speed in km/h over the first and last timestamped points.
///
/// Zero for fewer than two points, fewer than two timestamps, or a
/// non-positive elapsed time.
pub fn calculate_speed_kmh(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let first = points.iter().find_map(|p| p.time);
    let last = points.iter().rev().find_map(|p| p.time);
    let (Some(first), Some(last)) = (first, last) else {
        return 0.0;
    };

    let hours = (last - first).num_milliseconds() as f64 / 3_600_000.0;
    if hours <= 0.0 {
        return 0.0;
    }

    calculate_distance_km(points) / hours
}

/// Split a point sequence by time gaps.
///
/// A timestamped point strictly more than `max_gap` after the current
/// segment's anchor closes that segment and anchors a new one. A point
/// exactly `max_gap` after the anchor stays. Non-positive gaps use the default.
pub fn segment_points(points: &[GeoPoint], max_gap: Duration) -> Vec<Segment> {
    let max_gap = effective_gap(max_gap);
    let mut segments = Vec::new();
    let mut current: Vec<GeoPoint> = Vec::new();
    let mut anchor: Option<DateTime<Utc>> = None;

    for point in points {
        if let (Some(time), Some(anchor_time)) = (point.time, anchor) {
            if time - anchor_time > max_gap {
                segments.push(Segment::from_points(std::mem::take(&mut current)));
                anchor = None;
            }
        }

        if anchor.is_none() {
            anchor = point.time;
        }
        current.push(point.clone());
    }

    if !current.is_empty() {
        segments.push(Segment::from_points(current));
    }

    segments
}

/// Split every native segment of every track, in document order.
///
/// Empty native segments are skipped.
pub fn split_into_segments(gpx: &ParsedGpx, max_gap: Duration) -> Vec<Segment> {
    let segments: Vec<Segment> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .filter(|points| !points.is_empty())
        .flat_map(|points| segment_points(points, max_gap))
        .collect();

    debug!(
        "[Segments] Split {} points into {} segments",
        gpx.point_count(),
        segments.len()
    );
    segments
}
