//! End-to-end integration tests.
//!
//! Tests the full pipeline: catalog directory -> region store -> GPX parse ->
//! segmentation -> classification -> attribution.
//!
//! Run with: `cargo test --test pipeline`

use chrono::{Duration, TimeZone, Utc};
use patrol_geofence::{
    analyze_track, geo_utils, load_regions_from_dir, parse_gpx, segment_points,
    split_into_segments, AttributionMode, CatalogConfig, CatalogKind, GeoPoint, GeofenceError,
    MovementType, Region, RegionInfo, RegionStore, TrackAnalysisConfig, OUTSIDE_KEY,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rectangle(
    id: &str,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    buffer_km: f64,
) -> Region {
    Region::from_vertices(
        RegionInfo::new(id, id, "Tanzania"),
        &[
            (lat_min, lon_min),
            (lat_min, lon_max),
            (lat_max, lon_max),
            (lat_max, lon_min),
            (lat_min, lon_min),
        ],
        buffer_km,
    )
}

/// Boundary catalog with two parks, one with a real polygon and one centroid-only.
const BOUNDARY_CATALOG: &str = r#"[
    {
        "id": "TZA_Serengeti", "name": "Serengeti National Park", "country": "Tanzania",
        "country_code": "TZA", "wdpa_id": 916, "buffer_km": 5.0,
        "geometry": {"type": "Polygon", "coordinates": [[[34.0, -3.0], [35.5, -3.0], [35.5, -1.5], [34.0, -1.5], [34.0, -3.0]]]}
    },
    {
        "id": "KEN_Tsavo", "name": "Tsavo East", "country": "Kenya",
        "wdpa_id": "7441", "area_km2": 13747, "coordinates": {"lat": -2.9, "lon": 38.5}
    }
]"#;

const PATROL_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="inReach" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>Serengeti foot patrol</name></metadata>
  <trk>
    <name>Day 1</name>
    <trkseg>
      <trkpt lat="-2.2500" lon="34.7500"><ele>1510</ele><time>2024-03-01T06:00:00Z</time><desc>Tracking</desc></trkpt>
      <trkpt lat="-2.25225" lon="34.7500"><ele>1512</ele><time>2024-03-01T06:10:00Z</time></trkpt>
      <trkpt lat="-2.2545" lon="34.7500"><ele>1515</ele><time>2024-03-01T06:20:00Z</time><desc>Snare removed</desc></trkpt>
      <trkpt lat="-2.9000" lon="38.5000"><time>2024-03-01T09:00:00Z</time></trkpt>
      <trkpt lat="-2.9500" lon="38.5000"><time>2024-03-01T09:03:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_three_point_walk_is_one_foot_segment() {
    init_logging();
    let xml = r#"<gpx><trk><trkseg>
        <trkpt lat="-2.2500" lon="34.75"><time>2024-03-01T06:00:00Z</time></trkpt>
        <trkpt lat="-2.25225" lon="34.75"><time>2024-03-01T06:10:00Z</time></trkpt>
        <trkpt lat="-2.2545" lon="34.75"><time>2024-03-01T06:20:00Z</time></trkpt>
    </trkseg></trk></gpx>"#;

    let gpx = parse_gpx(xml).unwrap();
    let segments = split_into_segments(&gpx, Duration::zero());
    assert_eq!(segments.len(), 1);

    let segment = &segments[0];
    assert_eq!(segment.len(), 3);
    assert!(segment.distance_km > 0.0);
    assert!((segment.avg_speed_kmh - 1.5).abs() < 0.05);
    assert_eq!(segment.movement_type, MovementType::Foot);
}

#[test]
fn test_gap_boundary_scenario() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
    let points: Vec<GeoPoint> = [0, 10, 20]
        .iter()
        .map(|&m| GeoPoint::new(-2.0, 34.5).with_time(t0 + Duration::minutes(m)))
        .collect();

    assert_eq!(segment_points(&points, Duration::minutes(10)).len(), 2);
    assert_eq!(segment_points(&points, Duration::minutes(9)).len(), 3);
}

#[test]
fn test_assign_points_three_partitions() {
    let store = RegionStore::new(vec![
        rectangle("serengeti", -3.0, -1.5, 34.0, 35.5, 0.0),
        rectangle("ngorongoro", -3.4, -3.1, 35.3, 35.8, 0.0),
    ]);
    let points = vec![
        GeoPoint::new(-2.0, 34.5),
        GeoPoint::new(-2.5, 35.0),
        GeoPoint::new(-1.6, 34.1),
        GeoPoint::new(-3.2, 35.5),
        GeoPoint::new(-3.3, 35.6),
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(-5.0, 39.0),
    ];

    let groups = store.assign_points_to_regions(&points);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups["serengeti"].len(), 3);
    assert_eq!(groups["ngorongoro"].len(), 2);
    assert_eq!(groups[OUTSIDE_KEY].len(), 2);
}

#[test]
fn test_rectangle_buffer_scenario() {
    let store = RegionStore::new(vec![rectangle("rect", -3.0, -1.5, 34.0, 35.5, 5.0)]);
    assert!(store.find_region(-2.25, 34.75).is_some());
    assert!(store.find_region(-3.0, 34.0).is_some());
    assert!(store.find_region(-3.04, 34.0).is_some());
    assert!(store.find_region(-3.1, 34.0).is_none());
}

#[test]
fn test_london_paris() {
    let london = GeoPoint::new(51.5074, -0.1278);
    let paris = GeoPoint::new(48.8566, 2.3522);
    let d = geo_utils::haversine_km(&london, &paris);
    assert!((d - 344.0).abs() < 344.0 * 0.05);
}

// ============================================================================
// Full pipeline from a catalog directory
// ============================================================================

#[test]
fn test_catalog_dir_to_report() {
    init_logging();
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join(CatalogKind::Boundary.file_name()), BOUNDARY_CATALOG).unwrap();

    let store = load_regions_from_dir(dir.path(), &CatalogConfig::default()).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get("KEN_Tsavo").map(|r| r.info.registry_id.clone()),
        Some(Some("7441".to_string()))
    );

    let report = analyze_track(PATROL_GPX, &store, &TrackAnalysisConfig::default()).unwrap();
    assert_eq!(report.name.as_deref(), Some("Serengeti foot patrol"));
    assert_eq!(report.total_points, 5);
    assert_eq!(report.segments.len(), 2);

    let walk = &report.segments[0];
    assert_eq!(walk.region_id.as_deref(), Some("TZA_Serengeti"));
    assert_eq!(walk.segment.movement_type, MovementType::Foot);
    let analysis = walk.segment.analysis.as_ref().unwrap();
    assert_eq!(analysis.message_count, 1);
    assert_eq!(analysis.messages, vec!["Snare removed".to_string()]);

    // 5.56 km in 3 minutes
    let drive = &report.segments[1];
    assert_eq!(drive.region_id.as_deref(), Some("KEN_Tsavo"));
    assert_eq!(drive.segment.movement_type, MovementType::Vehicle);

    assert_eq!(report.region_ids(), vec!["KEN_Tsavo", "TZA_Serengeti"]);
    assert!(!report.distance_by_region.contains_key(OUTSIDE_KEY));
}

#[test]
fn test_catalog_dir_falls_back_to_basic_tier() {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join(CatalogKind::Boundary.file_name()), "not json").unwrap();
    std::fs::write(
        dir.path().join(CatalogKind::Basic.file_name()),
        r#"[{"id": "KEN_Tsavo", "name": "Tsavo East", "country": "Kenya", "area_km2": 13747, "coordinates": {"lat": -2.9, "lon": 38.5}}]"#,
    )
    .unwrap();

    let store = load_regions_from_dir(dir.path(), &CatalogConfig::default()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.find_region(-2.9, 38.5).is_some());
}

#[test]
fn test_catalog_dir_falls_back_to_bbox_tier() {
    init_logging();
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join(CatalogKind::Boundary.file_name()), "not json").unwrap();
    std::fs::write(
        dir.path().join(CatalogKind::BoundingBox.file_name()),
        r#"[{"id": "TZA_Serengeti", "name": "Serengeti", "country": "Tanzania",
            "bbox": {"lat_min": -3.0, "lat_max": -1.5, "lon_min": 34.0, "lon_max": 35.5}}]"#,
    )
    .unwrap();

    let store = load_regions_from_dir(dir.path(), &CatalogConfig::default()).unwrap();
    assert_eq!(store.len(), 1);

    let report = analyze_track(PATROL_GPX, &store, &TrackAnalysisConfig::default()).unwrap();
    assert_eq!(report.segments[0].region_id.as_deref(), Some("TZA_Serengeti"));
    assert!(report.segments[1].region_id.is_none());
}

#[test]
fn test_bad_catalog_area_leaves_other_regions_matching() {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(
        dir.path().join(CatalogKind::Basic.file_name()),
        r#"[
            {"id": "ok", "name": "Ok", "country": "T", "area_km2": 1000, "coordinates": {"lat": -2.0, "lon": 35.0}},
            {"id": "neg", "name": "Neg", "country": "T", "area_km2": -50, "coordinates": {"lat": 5.0, "lon": 5.0}},
            {"id": "ok2", "name": "Ok2", "country": "T", "area_km2": 500, "coordinates": {"lat": 10.0, "lon": 10.0}}
        ]"#,
    )
    .unwrap();

    let store = load_regions_from_dir(dir.path(), &CatalogConfig::default()).unwrap();
    assert_eq!(store.len(), 3);
    assert!(!store.get("neg").unwrap().is_usable());
    assert_eq!(store.find_region(-2.0, 35.0).map(|r| r.id()), Some("ok"));
    assert_eq!(store.find_region(10.0, 10.0).map(|r| r.id()), Some("ok2"));
    assert!(store.find_region(5.0, 5.0).is_none());
}

#[test]
fn test_missing_catalogs_error() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let err = load_regions_from_dir(dir.path(), &CatalogConfig::default()).unwrap_err();
    assert!(matches!(err, GeofenceError::CatalogUnavailable { .. }));
}

#[test]
fn test_majority_attribution_end_to_end() {
    let store = RegionStore::new(vec![rectangle("serengeti", -3.0, -1.5, 34.0, 35.5, 0.0)]);
    // Starts outside, spends most points inside
    let xml = r#"<gpx><trk><trkseg>
        <trkpt lat="-1.40" lon="34.50"/>
        <trkpt lat="-1.60" lon="34.50"/>
        <trkpt lat="-1.70" lon="34.50"/>
        <trkpt lat="-1.80" lon="34.50"/>
    </trkseg></trk></gpx>"#;

    let first = analyze_track(xml, &store, &TrackAnalysisConfig::default()).unwrap();
    assert!(first.segments[0].region_id.is_none());

    let config = TrackAnalysisConfig {
        attribution: AttributionMode::Majority,
        ..Default::default()
    };
    let majority = analyze_track(xml, &store, &config).unwrap();
    assert_eq!(majority.segments[0].region_id.as_deref(), Some("serengeti"));
}

#[test]
fn test_malformed_track_is_rejected_whole() {
    let store = RegionStore::default();
    let xml = r#"<gpx><trk><trkseg>
        <trkpt lat="-2.0" lon="34.0"/>
        <trkpt lat="oops" lon="34.0"/>
    </trkseg></trk>"#;
    let err = analyze_track(xml, &store, &TrackAnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, GeofenceError::MalformedTrack { .. }));
}

#[test]
fn test_bad_timestamps_degrade_to_zero_speed() {
    let store = RegionStore::default();
    let xml = r#"<gpx><trk><trkseg>
        <trkpt lat="-2.00" lon="34.0"><time>not a time</time></trkpt>
        <trkpt lat="-2.01" lon="34.0"><time>2024-13-45T99:00:00Z</time></trkpt>
    </trkseg></trk></gpx>"#;
    let report = analyze_track(xml, &store, &TrackAnalysisConfig::default()).unwrap();
    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].segment.avg_speed_kmh, 0.0);
    assert_eq!(report.segments[0].segment.movement_type, MovementType::Foot);
    assert!(report.segments[0].region_id.is_none());
}
