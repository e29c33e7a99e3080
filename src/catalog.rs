//! # Region Catalogs
//!
//! Region collections are loaded once, at startup, from JSON catalogs. Three
//! catalog tiers exist and [`load_regions_from_dir`] tries them in order:
//!
//! 1. **Boundary catalog** (`regions_with_boundaries.json`): true polygon or
//!    multi-polygon boundaries. Entries without a usable geometry fall back to
//!    a synthetic circle when they carry a centroid.
//! 2. **Basic catalog** (`regions_basic.json`): centroid and approximate area
//!    only, every entry becomes a synthetic circle.
//! 3. **Bounding-box catalog** (`regions_bbox.json`): rectangles.
//!
//! The first tier that reads and parses wins.
//!
//! The module also hosts [`RegistryIndex`], a name-searchable index of an
//! external protected-area registry.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GeofenceError, Result};
use crate::region::{
    GeoJsonGeometry, Region, RegionInfo, DEFAULT_CIRCLE_VERTICES, MIN_RING_VERTICES,
};
use crate::store::RegionStore;
use crate::Bounds;

// ============================================================================
// Configuration
// ============================================================================

/// The catalog tiers, in load-preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Boundary,
    Basic,
    BoundingBox,
}

impl CatalogKind {
    /// Order in which [`load_regions_from_dir`] tries the tiers.
    pub const LOAD_ORDER: [CatalogKind; 3] = [
        CatalogKind::Boundary,
        CatalogKind::Basic,
        CatalogKind::BoundingBox,
    ];

    /// File name of this tier inside a data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            CatalogKind::Boundary => "regions_with_boundaries.json",
            CatalogKind::Basic => "regions_basic.json",
            CatalogKind::BoundingBox => "regions_bbox.json",
        }
    }
}

/// Defaults applied while turning catalog entries into regions.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Buffer for boundary entries that do not specify one.
    /// Default: 5.0 km
    pub boundary_buffer_km: f64,
    /// Buffer for synthetic circles.
    /// Default: 2.0 km
    pub circle_buffer_km: f64,
    /// Buffer for bounding-box entries that do not specify one.
    /// Default: 0.0 km
    pub bbox_buffer_km: f64,
    /// Vertices used to approximate a circle.
    /// Default: 32
    pub circle_vertices: usize,
    /// Area assumed when a centroid-only entry has none.
    /// Default: 1000.0 km²
    pub default_area_km2: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            boundary_buffer_km: 5.0,
            circle_buffer_km: 2.0,
            bbox_buffer_km: 0.0,
            circle_vertices: DEFAULT_CIRCLE_VERTICES,
            default_area_km2: 1000.0,
        }
    }
}

// ============================================================================
// Catalog entry types
// ============================================================================

/// Known centroid of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

/// Registry ids appear both as JSON strings and numbers; blank strings mean none.
fn de_registry_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Centroid-only catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "de_registry_id")]
    pub wdpa_id: Option<String>,
    #[serde(default)]
    pub area_km2: Option<f64>,
    pub coordinates: Centroid,
}

/// Catalog entry with an optional true boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "de_registry_id")]
    pub wdpa_id: Option<String>,
    #[serde(default)]
    pub area_km2: Option<f64>,
    #[serde(default)]
    pub buffer_km: Option<f64>,
    #[serde(default)]
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub coordinates: Option<Centroid>,
}

impl From<BasicCatalogEntry> for BoundaryCatalogEntry {
    fn from(entry: BasicCatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            country: entry.country,
            country_code: entry.country_code,
            wdpa_id: entry.wdpa_id,
            area_km2: entry.area_km2,
            buffer_km: None,
            geometry: None,
            coordinates: Some(entry.coordinates),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BboxSpec {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

/// Rectangle catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboxCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub bbox: BboxSpec,
    #[serde(default)]
    pub buffer_km: Option<f64>,
}

// ============================================================================
// Entry -> Region conversion
// ============================================================================

fn circle_region(
    info: RegionInfo,
    centroid: Centroid,
    area_km2: Option<f64>,
    config: &CatalogConfig,
) -> Region {
    Region::synthetic_circle(
        info,
        centroid.lat,
        centroid.lon,
        area_km2.unwrap_or(config.default_area_km2),
        config.circle_buffer_km,
        config.circle_vertices,
    )
}

/// At least three distinct vertices once the ring is closed.
fn has_usable_geometry(geometry: &GeoJsonGeometry) -> bool {
    geometry.outer_ring().map_or(false, |mut ring| {
        ring.close();
        ring.0.len() > MIN_RING_VERTICES
    })
}

/// Convert boundary entries into regions, preserving catalog order.
pub fn regions_from_boundary_entries(
    entries: Vec<BoundaryCatalogEntry>,
    config: &CatalogConfig,
) -> Vec<Region> {
    let mut regions = Vec::with_capacity(entries.len());
    let mut circles = 0usize;

    for entry in entries {
        let info = RegionInfo {
            id: entry.id,
            name: entry.name,
            country: entry.country,
            country_code: entry.country_code,
            registry_id: entry.wdpa_id,
        };

        match (entry.geometry, entry.coordinates) {
            (Some(geometry), _) if has_usable_geometry(&geometry) => {
                let buffer = entry.buffer_km.unwrap_or(config.boundary_buffer_km);
                regions.push(Region::from_geometry(info, &geometry, buffer, entry.area_km2));
            }
            (_, Some(centroid)) => {
                circles += 1;
                regions.push(circle_region(info, centroid, entry.area_km2, config));
            }
            _ => {
                warn!(
                    "[Catalog] Skipping region '{}': no usable geometry and no centroid",
                    info.id
                );
            }
        }
    }

    if circles > 0 {
        debug!(
            "[Catalog] {} boundary entries fell back to circle approximations",
            circles
        );
    }

    regions
}

/// Convert centroid-only entries into synthetic-circle regions.
pub fn regions_from_basic_entries(
    entries: Vec<BasicCatalogEntry>,
    config: &CatalogConfig,
) -> Vec<Region> {
    entries
        .into_iter()
        .map(|entry| {
            let info = RegionInfo {
                id: entry.id,
                name: entry.name,
                country: entry.country,
                country_code: entry.country_code,
                registry_id: entry.wdpa_id,
            };
            circle_region(info, entry.coordinates, entry.area_km2, config)
        })
        .collect()
}

/// Convert rectangle entries into four-vertex regions.
pub fn regions_from_bbox_entries(
    entries: Vec<BboxCatalogEntry>,
    config: &CatalogConfig,
) -> Vec<Region> {
    entries
        .into_iter()
        .map(|entry| {
            let bounds = Bounds {
                min_lat: entry.bbox.lat_min,
                max_lat: entry.bbox.lat_max,
                min_lng: entry.bbox.lon_min,
                max_lng: entry.bbox.lon_max,
            };
            let buffer = entry.buffer_km.unwrap_or(config.bbox_buffer_km);
            let info = RegionInfo::new(&entry.id, &entry.name, &entry.country);
            Region::from_bounds(info, bounds, buffer)
        })
        .collect()
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_named(
    kind: CatalogKind,
    json: &str,
    source_name: &str,
    config: &CatalogConfig,
) -> Result<Vec<Region>> {
    let malformed = |e: serde_json::Error| GeofenceError::malformed_catalog(source_name, e);
    let regions = match kind {
        CatalogKind::Boundary => {
            regions_from_boundary_entries(serde_json::from_str(json).map_err(malformed)?, config)
        }
        CatalogKind::Basic => {
            regions_from_basic_entries(serde_json::from_str(json).map_err(malformed)?, config)
        }
        CatalogKind::BoundingBox => {
            regions_from_bbox_entries(serde_json::from_str(json).map_err(malformed)?, config)
        }
    };
    Ok(regions)
}

/// Parse a boundary catalog document (JSON array).
pub fn parse_boundary_catalog(json: &str, config: &CatalogConfig) -> Result<Vec<Region>> {
    parse_named(CatalogKind::Boundary, json, CatalogKind::Boundary.file_name(), config)
}

/// Parse a centroid-only catalog document (JSON array).
pub fn parse_basic_catalog(json: &str, config: &CatalogConfig) -> Result<Vec<Region>> {
    parse_named(CatalogKind::Basic, json, CatalogKind::Basic.file_name(), config)
}

/// Parse a bounding-box catalog document (JSON array).
pub fn parse_bbox_catalog(json: &str, config: &CatalogConfig) -> Result<Vec<Region>> {
    parse_named(
        CatalogKind::BoundingBox,
        json,
        CatalogKind::BoundingBox.file_name(),
        config,
    )
}

/// Load one catalog file of a known tier into a region store.
pub fn load_regions_from_file(
    path: impl AsRef<Path>,
    kind: CatalogKind,
    config: &CatalogConfig,
) -> Result<RegionStore> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let json = std::fs::read_to_string(path).map_err(|e| GeofenceError::Io {
        path: source_name.clone(),
        message: e.to_string(),
    })?;
    let regions = parse_named(kind, &json, &source_name, config)?;
    Ok(RegionStore::new(regions))
}

/// Load regions from a data directory, trying each catalog tier in order.
///
/// The first tier whose file exists and parses wins. Failures are logged and
/// the next tier is tried; if every tier fails the collected reasons are
/// returned as [`GeofenceError::CatalogUnavailable`].
pub fn load_regions_from_dir(dir: impl AsRef<Path>, config: &CatalogConfig) -> Result<RegionStore> {
    let dir = dir.as_ref();
    let mut failures = Vec::new();

    for kind in CatalogKind::LOAD_ORDER {
        let path = dir.join(kind.file_name());
        if !path.is_file() {
            debug!("[Catalog] {} not present", path.display());
            failures.push(format!("{}: not found", kind.file_name()));
            continue;
        }

        match load_regions_from_file(&path, kind, config) {
            Ok(store) => {
                info!(
                    "[Catalog] Loaded {} regions from {} ({:?} tier)",
                    store.len(),
                    path.display(),
                    kind
                );
                return Ok(store);
            }
            Err(e) => {
                warn!(
                    "[Catalog] Failed to load {}, falling back to next tier: {}",
                    path.display(),
                    e
                );
                failures.push(e.to_string());
            }
        }
    }

    Err(GeofenceError::CatalogUnavailable {
        message: format!("{} ({})", dir.display(), failures.join("; ")),
    })
}

// ============================================================================
// Registry Index
// ============================================================================

/// An entry of an external protected-area registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub wdpa_id: u64,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub iucn_category: Option<String>,
    #[serde(default)]
    pub area_km2: Option<f64>,
}

/// Name-searchable index over a registry dump.
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    entries: Vec<RegistryEntry>,
    by_id: HashMap<u64, usize>,
}

impl RegistryIndex {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.wdpa_id, i))
            .collect();
        Self { entries, by_id }
    }

    /// Parse a registry dump (JSON array of entries).
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<RegistryEntry> = serde_json::from_str(json)
            .map_err(|e| GeofenceError::malformed_catalog("registry index", e))?;
        Ok(Self::new(entries))
    }

    /// Case-insensitive substring search on names, in index order.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<&RegistryEntry> {
        if query.is_empty() {
            return Vec::new();
        }
        let query = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&query))
            .take(max_results)
            .collect()
    }

    pub fn get(&self, wdpa_id: u64) -> Option<&RegistryEntry> {
        self.by_id.get(&wdpa_id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
