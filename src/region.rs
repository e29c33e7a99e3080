//! # Polygon Membership Engine
//!
//! A [`Region`] is a named protected area with a single outer boundary ring.
//! Membership is answered by [`Region::contains_point`]:
//!
//! 1. bounding-box rejection against the ring bounds expanded by the buffer,
//! 2. ray casting on the outer ring,
//! 3. if still outside and the buffer is positive, the minimum planar
//!    point-to-edge distance compared against the buffer.
//!
//! Buffers are converted from kilometers with
//! [`KM_PER_DEGREE`](crate::geo_utils::KM_PER_DEGREE).
//!
//! Only the outer ring is kept. Holes are never subtracted, and a
//! multi-polygon is reduced at load time to the sub-polygon whose outer ring
//! has the largest bounding-box area. A point inside a hole, or on a smaller
//! island of a multi-part area, is therefore reported as inside (or outside)
//! accordingly.

use geo::{BoundingRect, Coord, LineString};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{km_to_degrees, point_to_segment_distance_sq, KM_PER_DEGREE};
use crate::Bounds;

/// Minimum number of distinct ring vertices for a usable polygon.
pub const MIN_RING_VERTICES: usize = 3;

/// Default vertex count for synthetic circle boundaries.
pub const DEFAULT_CIRCLE_VERTICES: usize = 32;

/// Identity and descriptive metadata of a region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    pub country: String,
    pub country_code: Option<String>,
    /// External registry identifier (e.g. a WDPA id)
    pub registry_id: Option<String>,
}

impl RegionInfo {
    pub fn new(id: &str, name: &str, country: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            country: country.to_string(),
            ..Default::default()
        }
    }
}

/// Where a region's boundary ring came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometrySource {
    /// A true polygon or multi-polygon boundary
    Boundary,
    /// Regular polygon approximating a circle around a known centroid
    SyntheticCircle,
    /// Rectangle taken from a bounding-box catalog
    BoundingBox,
}

/// GeoJSON geometry as found in region catalogs.
///
/// Coordinates are kept as raw JSON and decoded on demand so unknown geometry
/// types can be carried through without failing the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: serde_json::Value,
}

type Position = Vec<f64>;

impl GeoJsonGeometry {
    /// Outer ring of a `Polygon`, or of the largest sub-polygon of a `MultiPolygon`.
    ///
    /// Returns `None` for unsupported types or undecodable coordinates.
    pub fn outer_ring(&self) -> Option<LineString<f64>> {
        match self.kind.as_str() {
            "Polygon" => {
                let rings = Vec::<Vec<Position>>::deserialize(&self.coordinates).ok()?;
                rings.first().map(|ring| positions_to_ring(ring))
            }
            "MultiPolygon" => {
                let polygons = Vec::<Vec<Vec<Position>>>::deserialize(&self.coordinates).ok()?;
                let mut largest_idx = 0;
                let mut largest_area = 0.0;
                for (i, rings) in polygons.iter().enumerate() {
                    if let Some(outer) = rings.first() {
                        let area = bbox_area(&positions_to_ring(outer));
                        if area > largest_area {
                            largest_area = area;
                            largest_idx = i;
                        }
                    }
                }
                polygons
                    .get(largest_idx)
                    .and_then(|rings| rings.first())
                    .map(|ring| positions_to_ring(ring))
            }
            _ => None,
        }
    }
}

/// GeoJSON positions are `[lon, lat, (alt)]`; the altitude is dropped.
fn positions_to_ring(positions: &[Position]) -> LineString<f64> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect::<Vec<_>>()
        .into()
}

/// Bounding-box area of a ring in square degrees.
fn bbox_area(ring: &LineString<f64>) -> f64 {
    ring.bounding_rect()
        .map(|rect| rect.width() * rect.height())
        .unwrap_or(0.0)
}

/// A protected area with a precomputed boundary ring and bounding box.
///
/// Regions are immutable once built; all derived data is computed eagerly in
/// the constructors so a collection of regions can be shared across threads
/// without synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub info: RegionInfo,
    buffer_km: f64,
    area_km2: Option<f64>,
    source: GeometrySource,
    /// Closed outer ring, x = longitude, y = latitude
    ring: LineString<f64>,
    bounds: Option<Bounds>,
}

impl Region {
    fn build(
        info: RegionInfo,
        mut ring: LineString<f64>,
        buffer_km: f64,
        area_km2: Option<f64>,
        source: GeometrySource,
    ) -> Self {
        if ring.coords().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
            warn!(
                "[Region] {}: non-finite coordinate in ring, region will never match",
                info.id
            );
            ring = LineString::new(Vec::new());
        }
        ring.close();
        let bounds = ring.bounding_rect().map(Bounds::from);
        Self {
            info,
            buffer_km: buffer_km.max(0.0),
            area_km2,
            source,
            ring,
            bounds,
        }
    }

    /// Build a region from a list of `(lat, lon)` vertices.
    ///
    /// The ring is closed automatically if the last vertex does not repeat the first.
    pub fn from_vertices(info: RegionInfo, vertices: &[(f64, f64)], buffer_km: f64) -> Self {
        let ring: LineString<f64> = vertices
            .iter()
            .map(|&(lat, lon)| Coord { x: lon, y: lat })
            .collect::<Vec<_>>()
            .into();
        Self::build(info, ring, buffer_km, None, GeometrySource::Boundary)
    }

    /// Build a region from a catalog geometry.
    ///
    /// Unsupported geometry types produce a region with an empty ring, which
    /// never matches any point.
    pub fn from_geometry(
        info: RegionInfo,
        geometry: &GeoJsonGeometry,
        buffer_km: f64,
        area_km2: Option<f64>,
    ) -> Self {
        let ring = geometry.outer_ring().unwrap_or_else(|| {
            warn!(
                "[Region] {}: unsupported or undecodable '{}' geometry, region will never match",
                info.id, geometry.kind
            );
            LineString::new(Vec::new())
        });
        Self::build(info, ring, buffer_km, area_km2, GeometrySource::Boundary)
    }

    /// Approximate a region known only by centroid and area with a regular polygon.
    ///
    /// The radius is `sqrt(area / π)`; the longitude radius is widened by
    /// `1 / cos(lat)` so the shape stays roughly circular on the ground.
    /// A non-positive or non-finite area, or a non-finite center, yields an
    /// empty ring that never matches.
    pub fn synthetic_circle(
        info: RegionInfo,
        center_lat: f64,
        center_lon: f64,
        area_km2: f64,
        buffer_km: f64,
        vertices: usize,
    ) -> Self {
        let valid = area_km2.is_finite()
            && area_km2 > 0.0
            && center_lat.is_finite()
            && center_lon.is_finite();
        let ring = if valid {
            let radius_km = (area_km2 / std::f64::consts::PI).sqrt();
            circle_ring(center_lat, center_lon, radius_km, vertices)
        } else {
            warn!(
                "[Region] {}: no circle for area {} at ({}, {}), region will never match",
                info.id, area_km2, center_lat, center_lon
            );
            LineString::new(Vec::new())
        };
        Self::build(
            info,
            ring,
            buffer_km,
            Some(area_km2),
            GeometrySource::SyntheticCircle,
        )
    }

    /// Build a degenerate four-vertex rectangle region from bounds.
    pub fn from_bounds(info: RegionInfo, bounds: Bounds, buffer_km: f64) -> Self {
        let ring = LineString::from(vec![
            Coord { x: bounds.min_lng, y: bounds.min_lat },
            Coord { x: bounds.max_lng, y: bounds.min_lat },
            Coord { x: bounds.max_lng, y: bounds.max_lat },
            Coord { x: bounds.min_lng, y: bounds.max_lat },
        ]);
        Self::build(info, ring, buffer_km, None, GeometrySource::BoundingBox)
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn buffer_km(&self) -> f64 {
        self.buffer_km
    }

    /// Known or derived area; set for synthetic circles and when a catalog provides it.
    pub fn area_km2(&self) -> Option<f64> {
        self.area_km2
    }

    pub fn source(&self) -> GeometrySource {
        self.source
    }

    /// Closed outer ring (x = longitude, y = latitude).
    pub fn ring(&self) -> &LineString<f64> {
        &self.ring
    }

    /// Cached bounds of the outer ring, `None` when the ring is empty.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Number of distinct vertices in the outer ring.
    pub fn vertex_count(&self) -> usize {
        self.ring.0.len().saturating_sub(1)
    }

    /// Whether the ring can ever contain a point.
    pub fn is_usable(&self) -> bool {
        self.vertex_count() >= MIN_RING_VERTICES && self.bounds.is_some_and(|b| b.is_finite())
    }

    /// Bounds expanded by the region's own buffer, for spatial indexing.
    pub fn search_bounds(&self) -> Option<Bounds> {
        self.bounds.map(|b| b.expanded(km_to_degrees(self.buffer_km)))
    }

    /// Is the point inside the region or within its buffer distance of the boundary?
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        self.contains_point_with_buffer(lat, lon, self.buffer_km)
    }

    /// Membership test with an explicit buffer in kilometers.
    ///
    /// Membership only grows as the buffer grows. Negative buffers are treated as zero.
    pub fn contains_point_with_buffer(&self, lat: f64, lon: f64, buffer_km: f64) -> bool {
        if !self.is_usable() {
            return false;
        }

        let buffer_deg = km_to_degrees(buffer_km.max(0.0));

        if let Some(bounds) = &self.bounds {
            if !bounds.expanded(buffer_deg).contains(lat, lon) {
                return false;
            }
        }

        if point_in_ring(lat, lon, &self.ring) {
            return true;
        }

        buffer_deg > 0.0 && self.nearest_edge_distance_sq(lat, lon) <= buffer_deg * buffer_deg
    }

    /// Planar distance in degrees from the point to the nearest ring edge.
    ///
    /// Returns `f64::INFINITY` for unusable rings.
    pub fn boundary_distance_deg(&self, lat: f64, lon: f64) -> f64 {
        if !self.is_usable() {
            return f64::INFINITY;
        }
        self.nearest_edge_distance_sq(lat, lon).sqrt()
    }

    /// Approximate distance to the boundary in kilometers (flat-earth conversion).
    pub fn boundary_distance_km(&self, lat: f64, lon: f64) -> f64 {
        self.boundary_distance_deg(lat, lon) * KM_PER_DEGREE
    }

    fn nearest_edge_distance_sq(&self, lat: f64, lon: f64) -> f64 {
        let p = Coord { x: lon, y: lat };
        self.ring
            .lines()
            .map(|edge| point_to_segment_distance_sq(p, edge.start, edge.end))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Ray-casting point-in-ring test.
///
/// Casts a horizontal ray from the point and counts edge crossings; an odd
/// count means inside. Rings with fewer than three coordinates never contain
/// anything.
pub fn point_in_ring(lat: f64, lon: f64, ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();
    if n < MIN_RING_VERTICES {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);

        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Closed regular polygon of `vertices` points around a center.
pub fn circle_ring(
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
    vertices: usize,
) -> LineString<f64> {
    let vertices = vertices.max(MIN_RING_VERTICES);
    let radius_lat_deg = radius_km / KM_PER_DEGREE;
    let radius_lon_deg = radius_km / (KM_PER_DEGREE * center_lat.to_radians().cos());

    let mut coords: Vec<Coord<f64>> = (0..vertices)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / vertices as f64;
            Coord {
                x: center_lon + radius_lon_deg * angle.cos(),
                y: center_lat + radius_lat_deg * angle.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);

    LineString::new(coords)
}
