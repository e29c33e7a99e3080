//! # Spatial Attribution
//!
//! Links each [`Segment`] to at most one region of a [`RegionStore`].

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::segmentation::Segment;
use crate::store::RegionStore;

/// How a segment's region is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMode {
    /// Region containing the segment's first point.
    #[default]
    FirstPoint,
    /// Region containing the most points; ties go to the earliest region in
    /// store order.
    Majority,
}

/// A segment together with the region it was attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedSegment {
    #[serde(flatten)]
    pub segment: Segment,
    pub region_id: Option<String>,
    pub region_name: Option<String>,
}

impl AttributedSegment {
    pub fn is_attributed(&self) -> bool {
        self.region_id.is_some()
    }
}

/// Attribute every segment, preserving order.
pub fn attribute_segments(
    store: &RegionStore,
    segments: Vec<Segment>,
    mode: AttributionMode,
) -> Vec<AttributedSegment> {
    let attributed: Vec<AttributedSegment> = segments
        .into_iter()
        .map(|segment| attribute_segment(store, segment, mode))
        .collect();

    debug!(
        "[Attribution] {}/{} segments attributed ({:?})",
        attributed.iter().filter(|s| s.is_attributed()).count(),
        attributed.len(),
        mode
    );
    attributed
}

/// Attribute a single segment.
pub fn attribute_segment(
    store: &RegionStore,
    segment: Segment,
    mode: AttributionMode,
) -> AttributedSegment {
    let region = match mode {
        AttributionMode::FirstPoint => segment
            .points
            .first()
            .and_then(|p| store.find_region(p.latitude, p.longitude)),
        AttributionMode::Majority => {
            // region id -> points inside
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for point in &segment.points {
                if let Some(region) = store.find_region(point.latitude, point.longitude) {
                    *counts.entry(region.id()).or_default() += 1;
                }
            }
            let best = counts.values().copied().max().unwrap_or(0);
            if best == 0 {
                None
            } else {
                store
                    .iter()
                    .find(|r| counts.get(r.id()).copied() == Some(best))
            }
        }
    };

    let region_id = region.map(|r| r.id().to_string());
    let region_name = region.map(|r| r.name().to_string());
    AttributedSegment {
        segment,
        region_id,
        region_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Region, RegionInfo};
    use crate::GeoPoint;

    fn store() -> RegionStore {
        RegionStore::new(vec![
            Region::from_vertices(
                RegionInfo::new("west", "West Block", "T"),
                &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)],
                0.0,
            ),
            Region::from_vertices(
                RegionInfo::new("east", "East Block", "T"),
                &[(0.0, 1.0), (0.0, 2.0), (1.0, 2.0), (1.0, 1.0)],
                0.0,
            ),
        ])
    }

    fn segment(coords: &[(f64, f64)]) -> Segment {
        Segment::from_points(coords.iter().map(|&(lat, lon)| GeoPoint::new(lat, lon)).collect())
    }

    #[test]
    fn test_first_point_attribution() {
        let store = store();
        let segments = vec![
            segment(&[(0.5, 0.5), (0.5, 1.5), (0.5, 1.6)]),
            segment(&[(5.0, 5.0), (0.5, 0.5)]),
        ];
        let attributed = attribute_segments(&store, segments, AttributionMode::FirstPoint);

        assert_eq!(attributed[0].region_id.as_deref(), Some("west"));
        assert_eq!(attributed[0].region_name.as_deref(), Some("West Block"));
        assert!(!attributed[1].is_attributed());
    }

    #[test]
    fn test_majority_attribution() {
        let store = store();
        let attributed = attribute_segments(
            &store,
            vec![
                segment(&[(0.5, 0.5), (0.5, 1.5), (0.5, 1.6)]),
                segment(&[(5.0, 5.0), (5.0, 5.1), (0.5, 0.5)]),
                segment(&[(0.5, 1.5), (0.5, 0.5)]),
                segment(&[(5.0, 5.0)]),
            ],
            AttributionMode::Majority,
        );

        assert_eq!(attributed[0].region_id.as_deref(), Some("east"));
        // Outside points don't count against the single inside point
        assert_eq!(attributed[1].region_id.as_deref(), Some("west"));
        // Tie resolved by store order
        assert_eq!(attributed[2].region_id.as_deref(), Some("west"));
        assert!(attributed[3].region_id.is_none());
    }

    #[test]
    fn test_empty_segment() {
        let attributed = attribute_segment(&store(), segment(&[]), AttributionMode::FirstPoint);
        assert!(!attributed.is_attributed());
        assert_eq!(AttributionMode::default(), AttributionMode::FirstPoint);
    }
}
