//! HTTP client for fetching protected-area boundaries from a registry API.
//!
//! This module enriches centroid-only catalog entries with true boundaries:
//! - Connection pooling with a shared `reqwest` client
//! - Parallel fetching with bounded concurrency
//! - No automatic retry: a failed entry keeps its centroid and falls back to
//!   a synthetic circle when the catalog is loaded
//!
//! The registry serves `GET {base_url}/protected_areas/{wdpa_id}?token=…` and
//! answers `{"protected_area": {"geojson": {"geometry": {...}}}}`.

use log::{debug, info, warn};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::catalog::{BasicCatalogEntry, BoundaryCatalogEntry};
use crate::error::{GeofenceError, Result};
use crate::region::GeoJsonGeometry;

// Concurrency settings
const DEFAULT_CONCURRENCY: usize = 8;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Progress callback type: (completed, total)
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// API response for the protected-area endpoint
#[derive(Debug, Deserialize)]
struct ProtectedAreaResponse {
    protected_area: Option<ProtectedArea>,
}

#[derive(Debug, Deserialize)]
struct ProtectedArea {
    geojson: Option<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    geometry: Option<GeoJsonGeometry>,
}

/// Extract the boundary geometry from a registry response body.
pub fn parse_boundary_response(body: &str) -> Result<Option<GeoJsonGeometry>> {
    let response: ProtectedAreaResponse =
        serde_json::from_str(body).map_err(|e| GeofenceError::HttpError {
            message: format!("Parse error: {}", e),
            status_code: None,
        })?;

    Ok(response
        .protected_area
        .and_then(|pa| pa.geojson)
        .and_then(|feature| feature.geometry))
}

/// Map a non-success status to an error. 404 is not an error: the area simply
/// has no published boundary.
fn check_status(status: StatusCode) -> Result<bool> {
    if status.is_success() {
        return Ok(true);
    }
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }

    let message = match status {
        StatusCode::UNAUTHORIZED => "invalid or missing API token".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "rate limited".to_string(),
        s if s.is_server_error() => format!("server error {}", s),
        s => format!("unexpected status {}", s),
    };
    Err(GeofenceError::HttpError {
        message,
        status_code: Some(status.as_u16()),
    })
}

/// Boundary fetcher for a protected-area registry
pub struct BoundaryFetcher {
    client: Client,
    base_url: Url,
    token: String,
    max_concurrency: usize,
}

impl BoundaryFetcher {
    /// Create a new fetcher for the given API base URL and token
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(GeofenceError::ConfigError {
                message: "registry API token is empty".to_string(),
            });
        }
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| GeofenceError::ConfigError {
                message: format!("invalid registry base URL '{}'", base_url),
            })?;

        let client = Client::builder()
            .pool_max_idle_per_host(DEFAULT_CONCURRENCY)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeofenceError::HttpError {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            max_concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Endpoint for a single protected area. The id is percent-encoded as one
    /// path segment.
    pub fn boundary_url(&self, wdpa_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeofenceError::ConfigError {
                message: format!("registry base URL '{}' cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .push("protected_areas")
            .push(wdpa_id);
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    /// Fetch one boundary. `Ok(None)` when the registry has none for the id.
    pub async fn fetch_boundary(&self, wdpa_id: &str) -> Result<Option<GeoJsonGeometry>> {
        let resp = self
            .client
            .get(self.boundary_url(wdpa_id)?)
            .send()
            .await
            .map_err(request_error)?;

        if !check_status(resp.status())? {
            debug!("[Fetch] No boundary published for WDPA {}", wdpa_id);
            return Ok(None);
        }

        let body = resp.text().await.map_err(read_error)?;
        parse_boundary_response(&body)
    }

    /// Enrich centroid-only entries with boundaries, preserving order.
    ///
    /// Entries without a registry id are passed through untouched. Failures
    /// are logged and leave the entry without geometry.
    pub async fn fetch_boundaries(
        &self,
        entries: Vec<BasicCatalogEntry>,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<BoundaryCatalogEntry> {
        let total = entries.len() as u32;
        let completed = AtomicU32::new(0);
        let semaphore = Semaphore::new(self.max_concurrency);

        info!(
            "[Fetch] Fetching boundaries for {} regions with {} concurrent requests",
            total, self.max_concurrency
        );
        let start = Instant::now();

        let tasks = entries.into_iter().map(|entry| {
            let semaphore = &semaphore;
            let completed = &completed;
            let callback = on_progress.clone();

            async move {
                let mut enriched = BoundaryCatalogEntry::from(entry);

                if let Some(wdpa_id) = enriched.wdpa_id.clone() {
                    match semaphore.acquire().await {
                        Ok(_permit) => match self.fetch_boundary(&wdpa_id).await {
                            Ok(geometry) => enriched.geometry = geometry,
                            Err(e) => warn!(
                                "[Fetch] Boundary for {} (WDPA {}) failed: {}",
                                enriched.id, wdpa_id, e
                            ),
                        },
                        Err(e) => warn!("[Fetch] Semaphore closed: {}", e),
                    }
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref cb) = callback {
                    cb(done, total);
                }
                enriched
            }
        });

        let results = futures::future::join_all(tasks).await;

        let with_geometry = results.iter().filter(|e| e.geometry.is_some()).count();
        info!(
            "[Fetch] Completed: {}/{} boundaries in {:.2}s",
            with_geometry,
            total,
            start.elapsed().as_secs_f64()
        );

        results
    }

    /// Download any catalog document as text.
    pub async fn fetch_catalog(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !check_status(status)? {
            let location = url.split('?').next().unwrap_or(url);
            return Err(GeofenceError::HttpError {
                message: format!("catalog not found at {}", location),
                status_code: Some(status.as_u16()),
            });
        }

        resp.text().await.map_err(read_error)
    }
}

// reqwest includes the request URL, query token and all, in its error text
fn request_error(e: reqwest::Error) -> GeofenceError {
    GeofenceError::HttpError {
        message: format!("Request error: {}", e.without_url()),
        status_code: None,
    }
}

fn read_error(e: reqwest::Error) -> GeofenceError {
    GeofenceError::HttpError {
        message: format!("Read error: {}", e.without_url()),
        status_code: None,
    }
}

/// Synchronous wrapper - runs [`BoundaryFetcher::fetch_boundaries`] on a fresh tokio runtime
pub fn fetch_boundaries_blocking(
    base_url: &str,
    token: &str,
    entries: Vec<BasicCatalogEntry>,
) -> Result<Vec<BoundaryCatalogEntry>> {
    use tokio::runtime::Runtime;

    let rt = Runtime::new().map_err(|e| GeofenceError::ConfigError {
        message: format!("Failed to create tokio runtime: {}", e),
    })?;
    let fetcher = BoundaryFetcher::new(base_url, token)?;
    Ok(rt.block_on(fetcher.fetch_boundaries(entries, None)))
}
