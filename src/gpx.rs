//! # GPX Track Parser
//!
//! Decodes GPX documents (`gpx → trk → trkseg → trkpt`) into ordered point
//! lists, keeping each track's native segments. No time-gap splitting happens
//! here; see [`crate::segmentation`].
//!
//! Parsing is all-or-nothing per document: malformed XML, a non-`gpx` root,
//! a point with a missing or non-numeric `lat`/`lon`, or a non-numeric `<ele>`
//! rejects the whole document. Per-point timestamps are the exception: an
//! absent or unparsable `<time>` leaves the point untimed.
//!
//! Elements are matched by local name, so GPX 1.0, GPX 1.1 and
//! un-namespaced documents are all accepted.

use chrono::{DateTime, Utc};
use log::debug;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::{GeofenceError, OptionExt, Result};
use crate::GeoPoint;

/// A parsed GPX document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedGpx {
    /// `<metadata><name>`, if present
    pub name: Option<String>,
    pub tracks: Vec<Track>,
}

/// One `<trk>` with its native `<trkseg>` groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<Vec<GeoPoint>>,
}

impl Track {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

impl ParsedGpx {
    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::point_count).sum()
    }

    /// Every point of every track, in document order.
    pub fn points(&self) -> impl Iterator<Item = &GeoPoint> {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|s| s.iter())
    }

    /// Document name, falling back to the first named track.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.tracks.iter().find_map(|t| t.name.as_deref()))
    }
}

/// Parse a GPX document from raw bytes (must be UTF-8).
pub fn parse_gpx_bytes(bytes: &[u8]) -> Result<ParsedGpx> {
    let xml = std::str::from_utf8(bytes)
        .map_err(|e| GeofenceError::malformed_track(format!("not valid UTF-8: {}", e)))?;
    parse_gpx(xml)
}

/// Parse a GPX document.
pub fn parse_gpx(xml: &str) -> Result<ParsedGpx> {
    let doc = Document::parse(xml)
        .map_err(|e| GeofenceError::malformed_track(format!("invalid XML: {}", e)))?;

    let root = doc.root_element();
    if !root.has_tag_name("gpx") {
        return Err(GeofenceError::malformed_track(format!(
            "expected <gpx> root element, found <{}>",
            root.tag_name().name()
        )));
    }

    let name = child(root, "metadata").and_then(|m| child_text(m, "name"));

    let tracks = root
        .children()
        .filter(|n| n.has_tag_name("trk"))
        .map(parse_track)
        .collect::<Result<Vec<_>>>()?;

    let parsed = ParsedGpx { name, tracks };
    debug!(
        "[Gpx] Parsed {} tracks with {} points",
        parsed.tracks.len(),
        parsed.point_count()
    );
    Ok(parsed)
}

fn parse_track(trk: Node) -> Result<Track> {
    let segments = trk
        .children()
        .filter(|n| n.has_tag_name("trkseg"))
        .map(|seg| {
            seg.children()
                .filter(|n| n.has_tag_name("trkpt"))
                .map(parse_point)
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Track {
        name: child_text(trk, "name"),
        segments,
    })
}

fn parse_point(trkpt: Node) -> Result<GeoPoint> {
    let latitude = coordinate_attr(trkpt, "lat")?;
    let longitude = coordinate_attr(trkpt, "lon")?;

    let elevation = match child_text(trkpt, "ele") {
        Some(text) => Some(text.parse::<f64>().map_err(|_| {
            GeofenceError::malformed_track(format!("invalid <ele> value '{}'", text))
        })?),
        None => None,
    };

    let time = child_text(trkpt, "time").and_then(|text| match parse_timestamp(&text) {
        Some(t) => Some(t),
        None => {
            debug!("[Gpx] Ignoring unparsable timestamp '{}'", text);
            None
        }
    });

    Ok(GeoPoint {
        latitude,
        longitude,
        elevation,
        time,
        description: child_text(trkpt, "desc"),
    })
}

fn coordinate_attr(node: Node, attr: &str) -> Result<f64> {
    let raw = node
        .attribute(attr)
        .ok_or_malformed_track(&format!("<trkpt> missing '{}' attribute", attr))?;
    raw.trim().parse::<f64>().map_err(|_| {
        GeofenceError::malformed_track(format!("invalid '{}' attribute '{}'", attr, raw))
    })
}

/// RFC 3339 timestamp normalized to UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

/// Trimmed text of the first `name` child; empty text counts as absent.
fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
