//! Unified error handling for the patrol-geofence library.
//!
//! Only genuinely malformed input surfaces as an error. Degenerate region
//! geometry and missing timestamps degrade to "never matches" and zero speed
//! instead.

use std::fmt;

/// Unified error type for geofencing and track-analysis operations.
#[derive(Debug, Clone)]
pub enum GeofenceError {
    /// Track document could not be parsed (the whole document is rejected)
    MalformedTrack { message: String },
    /// Region catalog document could not be parsed
    MalformedCatalog {
        source_name: String,
        message: String,
    },
    /// No catalog tier could be loaded
    CatalogUnavailable { message: String },
    /// Filesystem error while reading a catalog
    Io { path: String, message: String },
    /// Configuration error
    ConfigError { message: String },
    /// HTTP/API error
    HttpError {
        message: String,
        status_code: Option<u16>,
    },
}

impl fmt::Display for GeofenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceError::MalformedTrack { message } => {
                write!(f, "Malformed track document: {}", message)
            }
            GeofenceError::MalformedCatalog {
                source_name,
                message,
            } => {
                write!(f, "Malformed region catalog '{}': {}", source_name, message)
            }
            GeofenceError::CatalogUnavailable { message } => {
                write!(f, "No region catalog available: {}", message)
            }
            GeofenceError::Io { path, message } => {
                write!(f, "I/O error on '{}': {}", path, message)
            }
            GeofenceError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            GeofenceError::HttpError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for GeofenceError {}

/// Result type alias for patrol-geofence operations.
pub type Result<T> = std::result::Result<T, GeofenceError>;

impl GeofenceError {
    pub(crate) fn malformed_track(message: impl Into<String>) -> Self {
        GeofenceError::MalformedTrack {
            message: message.into(),
        }
    }

    pub(crate) fn malformed_catalog(source_name: &str, message: impl fmt::Display) -> Self {
        GeofenceError::MalformedCatalog {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Extension trait for converting Option to GeofenceError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a malformed-track error.
    fn ok_or_malformed_track(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed_track(self, message: &str) -> Result<T> {
        self.ok_or_else(|| GeofenceError::malformed_track(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeofenceError::MalformedCatalog {
            source_name: "regions_basic.json".to_string(),
            message: "expected value at line 1".to_string(),
        };
        assert!(err.to_string().contains("regions_basic.json"));
        assert!(err.to_string().contains("line 1"));

        let err = GeofenceError::HttpError {
            message: "rate limited".to_string(),
            status_code: Some(429),
        };
        assert_eq!(err.to_string(), "HTTP error (429): rate limited");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<f64> = None;
        let result = none.ok_or_malformed_track("trkpt without lat");
        assert!(matches!(result, Err(GeofenceError::MalformedTrack { .. })));

        let some = Some(1.5).ok_or_malformed_track("unused");
        assert_eq!(some.unwrap(), 1.5);
    }
}
