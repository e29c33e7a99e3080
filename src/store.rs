//! # Region Store
//!
//! An immutable collection of [`Region`]s with point lookup.
//!
//! Lookup is **first-match**: regions are checked in load order and the first
//! one whose [`Region::contains_point`] holds wins. Overlapping regions are
//! not disambiguated by area or distance; [`RegionStore::locate`] reports
//! overlaps explicitly for callers that care.
//!
//! An R-tree over each region's buffered bounding box prunes the candidates,
//! and the survivors are re-ordered by load index so the first-match policy is
//! unaffected by the index.
//!
//! A store is never mutated after construction, so a shared reference can be
//! read from any number of threads. [`install_region_store`] publishes one
//! process-wide instance.

use std::collections::HashMap;

use log::info;
use once_cell::sync::OnceCell;
use rstar::{RTree, RTreeObject, AABB};

use crate::error::{GeofenceError, Result};
use crate::region::Region;
use crate::{Bounds, GeoPoint};

/// Key under which [`RegionStore::assign_points_to_regions`] groups points
/// that fall in no region.
pub const OUTSIDE_KEY: &str = "outside";

/// Buffered region bounds wrapper for R-tree spatial indexing.
#[derive(Debug, Clone)]
struct RegionEnvelope {
    /// Load index into `RegionStore::regions`
    index: usize,
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}

/// Outcome of a point lookup that keeps overlap information.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionMatch<'a> {
    Outside,
    Unambiguous(&'a Region),
    /// Several regions contain the point, in load order
    Ambiguous(Vec<&'a Region>),
}

impl<'a> RegionMatch<'a> {
    /// The region first-match lookup would return.
    pub fn first(&self) -> Option<&'a Region> {
        match self {
            RegionMatch::Outside => None,
            RegionMatch::Unambiguous(region) => Some(region),
            RegionMatch::Ambiguous(regions) => regions.first().copied(),
        }
    }
}

/// Load-once, read-only region collection.
#[derive(Debug)]
pub struct RegionStore {
    regions: Vec<Region>,
    spatial_index: RTree<RegionEnvelope>,
    by_id: HashMap<String, usize>,
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RegionStore {
    /// Build a store; the vector order is the first-match order.
    pub fn new(regions: Vec<Region>) -> Self {
        let envelopes: Vec<RegionEnvelope> = regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_usable())
            .filter_map(|(index, r)| {
                // A NaN envelope breaks intersection queries for its neighbours
                r.search_bounds().filter(Bounds::is_finite).map(|b| RegionEnvelope {
                    index,
                    min_lat: b.min_lat,
                    max_lat: b.max_lat,
                    min_lng: b.min_lng,
                    max_lng: b.max_lng,
                })
            })
            .collect();

        let mut by_id = HashMap::with_capacity(regions.len());
        for (index, region) in regions.iter().enumerate() {
            // Duplicate ids resolve to the earliest region, matching lookup order
            by_id.entry(region.id().to_string()).or_insert(index);
        }

        info!(
            "[Store] Built region store: {} regions ({} indexed)",
            regions.len(),
            envelopes.len()
        );

        Self {
            regions,
            spatial_index: RTree::bulk_load(envelopes),
            by_id,
        }
    }

    /// Load indices of regions whose buffered bounds contain the point, ascending.
    fn candidates(&self, lat: f64, lon: f64) -> Vec<usize> {
        let query = AABB::from_point([lon, lat]);
        let mut indices: Vec<usize> = self
            .spatial_index
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// First region, in load order, containing the point.
    pub fn find_region(&self, lat: f64, lon: f64) -> Option<&Region> {
        self.candidates(lat, lon)
            .into_iter()
            .map(|i| &self.regions[i])
            .find(|r| r.contains_point(lat, lon))
    }

    /// Every region containing the point, in load order.
    pub fn find_regions(&self, lat: f64, lon: f64) -> Vec<&Region> {
        self.candidates(lat, lon)
            .into_iter()
            .map(|i| &self.regions[i])
            .filter(|r| r.contains_point(lat, lon))
            .collect()
    }

    pub fn locate(&self, lat: f64, lon: f64) -> RegionMatch<'_> {
        let mut found = self.find_regions(lat, lon);
        match found.len() {
            0 => RegionMatch::Outside,
            1 => RegionMatch::Unambiguous(found.remove(0)),
            _ => RegionMatch::Ambiguous(found),
        }
    }

    fn region_key(&self, point: &GeoPoint) -> String {
        self.find_region(point.latitude, point.longitude)
            .map(|r| r.id().to_string())
            .unwrap_or_else(|| OUTSIDE_KEY.to_string())
    }

    /// Group points by first-match region id; unmatched points go under [`OUTSIDE_KEY`].
    ///
    /// Only keys with at least one point are present, and each group keeps the
    /// input order.
    pub fn assign_points_to_regions(&self, points: &[GeoPoint]) -> HashMap<String, Vec<GeoPoint>> {
        let mut groups: HashMap<String, Vec<GeoPoint>> = HashMap::new();
        for point in points {
            groups
                .entry(self.region_key(point))
                .or_default()
                .push(point.clone());
        }
        groups
    }

    /// Parallel [`assign_points_to_regions`](Self::assign_points_to_regions) with identical output.
    #[cfg(feature = "parallel")]
    pub fn assign_points_to_regions_parallel(
        &self,
        points: &[GeoPoint],
    ) -> HashMap<String, Vec<GeoPoint>> {
        use rayon::prelude::*;

        let keys: Vec<String> = points.par_iter().map(|p| self.region_key(p)).collect();

        let mut groups: HashMap<String, Vec<GeoPoint>> = HashMap::new();
        for (key, point) in keys.into_iter().zip(points) {
            groups.entry(key).or_default().push(point.clone());
        }
        groups
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.by_id.get(id).map(|&i| &self.regions[i])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }
}

impl<'a> IntoIterator for &'a RegionStore {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Global Store
// ============================================================================

/// Process-wide region store, set once at startup and read-only afterwards.
static REGION_STORE: OnceCell<RegionStore> = OnceCell::new();

/// Publish the process-wide store. Fails if one is already installed.
pub fn install_region_store(store: RegionStore) -> Result<&'static RegionStore> {
    let count = store.len();
    REGION_STORE
        .set(store)
        .map_err(|_| GeofenceError::ConfigError {
            message: "region store already installed".to_string(),
        })?;
    info!("[Store] Installed process-wide region store ({} regions)", count);
    region_store().ok_or_else(|| GeofenceError::ConfigError {
        message: "region store missing after install".to_string(),
    })
}

/// The process-wide store, if one has been installed.
pub fn region_store() -> Option<&'static RegionStore> {
    REGION_STORE.get()
}
