//! # Patrol Geofence
//!
//! Protected-area geofencing and GPS patrol-track analysis.
//!
//! This library provides:
//! - Point-in-region tests against protected-area boundaries with a km buffer
//! - A load-once, read-only region store with first-match lookup
//! - GPX track parsing, time-gap segmentation and speed computation
//! - Movement classification (foot / vehicle / aircraft) and coverage-quality scoring
//! - Attribution of track segments to the region they were recorded in
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon
//! - **`http`** - Enable HTTP client for fetching region boundaries
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use patrol_geofence::{Region, RegionInfo, RegionStore, GeoPoint};
//!
//! let serengeti = Region::from_vertices(
//!     RegionInfo::new("serengeti", "Serengeti", "Tanzania"),
//!     &[(-3.0, 34.0), (-3.0, 35.5), (-1.5, 35.5), (-1.5, 34.0)],
//!     5.0,
//! );
//! let store = RegionStore::new(vec![serengeti]);
//!
//! let region = store.find_region(-2.25, 34.75);
//! assert_eq!(region.map(|r| r.id()), Some("serengeti"));
//! ```

use chrono::{DateTime, Utc};
use geo::Rect;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{GeofenceError, OptionExt, Result};

// Geographic utilities (distance, bearing, planar helpers)
pub mod geo_utils;

// Polygon membership engine
pub mod region;
pub use region::{GeoJsonGeometry, GeometrySource, Region, RegionInfo};

// Region catalogs and registry index
pub mod catalog;
pub use catalog::{
    load_regions_from_dir, load_regions_from_file, parse_basic_catalog, parse_bbox_catalog,
    parse_boundary_catalog, BasicCatalogEntry, BoundaryCatalogEntry, CatalogConfig, CatalogKind,
    RegistryEntry, RegistryIndex,
};

// Region store (first-match lookup, batch assignment, process-wide instance)
pub mod store;
pub use store::{install_region_store, region_store, RegionMatch, RegionStore, OUTSIDE_KEY};

// GPX track parsing
pub mod gpx;
pub use gpx::{parse_gpx, parse_gpx_bytes, ParsedGpx, Track};

// Time-gap segmentation
pub mod segmentation;
pub use segmentation::{segment_points, split_into_segments, Segment, SegmentConfig};

// Movement classification and pattern analysis
pub mod classify;
pub use classify::{
    analyze_points, classify_movement, CoverageQuality, MovementType, PatternAnalysis,
    SpeedCategory,
};

// Spatial attribution of segments to regions
pub mod attribution;
pub use attribution::{attribute_segments, AttributedSegment, AttributionMode};

// End-to-end track analysis
pub mod pipeline;
pub use pipeline::{analyze_track, analyze_tracks, TrackAnalysisConfig, TrackReport};
#[cfg(feature = "parallel")]
pub use pipeline::analyze_tracks_parallel;

// HTTP module for boundary fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::BoundaryFetcher;

// ============================================================================
// Core Types
// ============================================================================

/// A single GPS observation.
///
/// # Example
/// ```
/// use patrol_geofence::GeoPoint;
/// let point = GeoPoint::new(-2.3333, 34.8333); // Serengeti
/// assert!(point.time.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    /// Free-text annotation (e.g. a satellite messenger message)
    pub description: Option<String>,
}

impl GeoPoint {
    /// Create a new GPS point without elevation, time or annotation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
            description: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Check if the point has valid coordinates.
    ///
    /// Advisory only: the engine itself never rejects out-of-range points.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Grow the box by `degrees` on every side.
    pub fn expanded(&self, degrees: f64) -> Self {
        Self {
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
            min_lng: self.min_lng - degrees,
            max_lng: self.max_lng + degrees,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }

    pub fn is_finite(&self) -> bool {
        self.min_lat.is_finite()
            && self.max_lat.is_finite()
            && self.min_lng.is_finite()
            && self.max_lng.is_finite()
    }
}

impl From<Rect<f64>> for Bounds {
    /// Rect coordinates are x = longitude, y = latitude.
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
