//! # Movement Classification
//!
//! Two levels of analysis for a segment's points:
//!
//! - [`classify_movement`]: the coarse foot / vehicle / aircraft label derived
//!   purely from average speed. Thresholds are fixed.
//! - [`analyze_points`]: a richer [`PatternAnalysis`] with per-leg speeds, a
//!   finer [`SpeedCategory`], path sinuosity, circling detection, device
//!   messages and a 0-100 coverage-quality score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo_utils::{bearing_degrees, haversine_km, haversine_km_coords, turn_angle};
use crate::GeoPoint;

/// Speeds below this are on foot (km/h).
pub const FOOT_MAX_KMH: f64 = 8.0;

/// Speeds up to and including this are vehicles; above is aircraft (km/h).
pub const VEHICLE_MAX_KMH: f64 = 120.0;

/// Legs longer than this are ignored when computing leg speeds (hours).
const MAX_LEG_HOURS: f64 = 24.0;

/// Sinuosity is only meaningful once start and end are this far apart (km).
const MIN_DIRECT_DISTANCE_KM: f64 = 0.1;

/// Below this sinuosity a path counts as a straight line.
const STRAIGHT_LINE_SINUOSITY: f64 = 1.2;

const MIN_BEARINGS_FOR_CIRCLING: usize = 10;
const CIRCLING_WINDOW: usize = 5;
const CIRCLING_THRESHOLD_DEGREES: f64 = 270.0;

const MAX_STORED_MESSAGES: usize = 10;

/// Automatic annotations emitted by satellite messengers; not real messages.
const DEFAULT_DEVICE_MESSAGES: [&str; 3] = [
    "I'm checking in. Everything is okay.",
    "Tracking",
    "Waypoint",
];

// ============================================================================
// Types
// ============================================================================

/// Coarse movement mode of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Foot,
    Vehicle,
    Aircraft,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Foot => "foot",
            MovementType::Vehicle => "vehicle",
            MovementType::Aircraft => "aircraft",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer speed band used for coverage scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedCategory {
    /// < 1 km/h
    Stationary,
    /// < 3 km/h
    SlowPatrol,
    /// < 6 km/h
    FastPatrol,
    /// < 30 km/h
    SlowVehicle,
    /// < 80 km/h
    FastVehicle,
    /// < 150 km/h
    LowAltitude,
    HighAltitude,
}

impl SpeedCategory {
    pub fn from_speed(speed_kmh: f64) -> Self {
        match speed_kmh {
            s if s < 1.0 => SpeedCategory::Stationary,
            s if s < 3.0 => SpeedCategory::SlowPatrol,
            s if s < 6.0 => SpeedCategory::FastPatrol,
            s if s < 30.0 => SpeedCategory::SlowVehicle,
            s if s < 80.0 => SpeedCategory::FastVehicle,
            s if s < 150.0 => SpeedCategory::LowAltitude,
            _ => SpeedCategory::HighAltitude,
        }
    }

    /// Movement mode implied by the band.
    ///
    /// The bands are coarser than [`classify_movement`]: 120-150 km/h is
    /// `LowAltitude` here.
    pub fn movement_type(&self) -> MovementType {
        match self {
            SpeedCategory::Stationary | SpeedCategory::SlowPatrol | SpeedCategory::FastPatrol => {
                MovementType::Foot
            }
            SpeedCategory::SlowVehicle | SpeedCategory::FastVehicle => MovementType::Vehicle,
            SpeedCategory::LowAltitude | SpeedCategory::HighAltitude => MovementType::Aircraft,
        }
    }

    fn quality_adjustment(&self) -> f64 {
        match self {
            SpeedCategory::Stationary => 0.0,
            SpeedCategory::SlowPatrol => 30.0,
            SpeedCategory::FastPatrol => 20.0,
            SpeedCategory::SlowVehicle => 15.0,
            SpeedCategory::FastVehicle => 5.0,
            SpeedCategory::LowAltitude => 20.0,
            SpeedCategory::HighAltitude => -10.0,
        }
    }
}

/// Bucketed coverage-quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageQuality {
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl CoverageQuality {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            CoverageQuality::Excellent
        } else if score >= 60.0 {
            CoverageQuality::Good
        } else if score >= 40.0 {
            CoverageQuality::Moderate
        } else {
            CoverageQuality::Poor
        }
    }
}

/// Pattern analysis of a point sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    /// Mean of per-leg speeds
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub movement_type: MovementType,
    pub speed_category: SpeedCategory,
    /// Path length over start-to-end distance; 0 when start and end nearly coincide
    pub sinuosity: f64,
    pub is_straight_line: bool,
    pub has_circling: bool,
    pub circling_count: usize,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<String>,
    /// 0-100
    pub quality_score: f64,
    pub coverage_quality: CoverageQuality,
}

impl Default for PatternAnalysis {
    fn default() -> Self {
        Self {
            avg_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            movement_type: MovementType::Foot,
            speed_category: SpeedCategory::Stationary,
            sinuosity: 0.0,
            is_straight_line: false,
            has_circling: false,
            circling_count: 0,
            message_count: 0,
            messages: Vec::new(),
            quality_score: 0.0,
            coverage_quality: CoverageQuality::Poor,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Movement mode from average speed.
///
/// | Speed (km/h) | Mode |
/// |--------------|------|
/// | < 8 | foot |
/// | 8 to 120 inclusive | vehicle |
/// | > 120 | aircraft |
pub fn classify_movement(avg_speed_kmh: f64) -> MovementType {
    if avg_speed_kmh < FOOT_MAX_KMH {
        MovementType::Foot
    } else if avg_speed_kmh <= VEHICLE_MAX_KMH {
        MovementType::Vehicle
    } else {
        MovementType::Aircraft
    }
}

/// Run the full pattern analysis over a point sequence.
///
/// Fewer than two points yield [`PatternAnalysis::default`].
pub fn analyze_points(points: &[GeoPoint]) -> PatternAnalysis {
    if points.len() < 2 {
        return PatternAnalysis::default();
    }

    let mut leg_speeds = Vec::new();
    let mut bearings = Vec::with_capacity(points.len() - 1);
    let mut total_distance = 0.0;

    for pair in points.windows(2) {
        let (p1, p2) = (&pair[0], &pair[1]);
        let dist = haversine_km(p1, p2);
        total_distance += dist;

        if let (Some(t1), Some(t2)) = (p1.time, p2.time) {
            let hours = (t2 - t1).num_milliseconds() as f64 / 3_600_000.0;
            if hours > 0.0 && hours < MAX_LEG_HOURS {
                leg_speeds.push(dist / hours);
            }
        }

        bearings.push(bearing_degrees(
            p1.latitude,
            p1.longitude,
            p2.latitude,
            p2.longitude,
        ));
    }

    let (avg_speed_kmh, max_speed_kmh) = if leg_speeds.is_empty() {
        (0.0, 0.0)
    } else {
        let sum: f64 = leg_speeds.iter().sum();
        let max = leg_speeds.iter().copied().fold(0.0, f64::max);
        (sum / leg_speeds.len() as f64, max)
    };

    let speed_category = SpeedCategory::from_speed(avg_speed_kmh);

    let mut sinuosity = 0.0;
    let mut is_straight_line = false;
    if total_distance > 0.0 {
        let first = &points[0];
        let last = &points[points.len() - 1];
        let direct =
            haversine_km_coords(first.latitude, first.longitude, last.latitude, last.longitude);
        if direct > MIN_DIRECT_DISTANCE_KM {
            sinuosity = total_distance / direct;
            is_straight_line = sinuosity < STRAIGHT_LINE_SINUOSITY;
        }
    }

    let circling_count = count_circling(&bearings);

    let mut messages = Vec::new();
    let mut message_count = 0;
    for text in points.iter().filter_map(|p| p.description.as_deref()) {
        if text.is_empty() || DEFAULT_DEVICE_MESSAGES.contains(&text) {
            continue;
        }
        message_count += 1;
        if messages.len() < MAX_STORED_MESSAGES {
            messages.push(text.to_string());
        }
    }

    let mut analysis = PatternAnalysis {
        avg_speed_kmh,
        max_speed_kmh,
        movement_type: speed_category.movement_type(),
        speed_category,
        sinuosity,
        is_straight_line,
        has_circling: circling_count > 0,
        circling_count,
        message_count,
        messages,
        quality_score: 0.0,
        coverage_quality: CoverageQuality::Poor,
    };
    analysis.quality_score = quality_score(&analysis);
    analysis.coverage_quality = CoverageQuality::from_score(analysis.quality_score);
    analysis
}

/// Count circling events in a bearing sequence.
///
/// A window of five consecutive bearings whose four turn angles sum past
/// 270° is one event; scanning resumes after the window.
pub fn count_circling(bearings: &[f64]) -> usize {
    if bearings.len() < MIN_BEARINGS_FOR_CIRCLING {
        return 0;
    }

    let mut count = 0;
    let mut i = 0;
    while i + CIRCLING_WINDOW <= bearings.len() {
        let total: f64 = bearings[i..i + CIRCLING_WINDOW]
            .windows(2)
            .map(|w| turn_angle(w[0], w[1]))
            .sum();

        if total > CIRCLING_THRESHOLD_DEGREES {
            count += 1;
            i += CIRCLING_WINDOW;
        } else {
            i += 1;
        }
    }
    count
}

fn quality_score(analysis: &PatternAnalysis) -> f64 {
    let mut score = 50.0 + analysis.speed_category.quality_adjustment();

    if analysis.sinuosity > 2.0 {
        score += 15.0;
    } else if analysis.sinuosity > 1.5 {
        score += 10.0;
    } else if analysis.is_straight_line {
        score -= 15.0;
    }

    score += analysis.circling_count as f64 * 3.0;

    score.clamp(0.0, 100.0)
}
