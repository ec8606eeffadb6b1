//! Error types for the burn-severity pipeline crates.

use thiserror::Error;

/// Result type alias using NbrError.
pub type NbrResult<T> = Result<T, NbrError>;

/// Primary error type for NBR computations.
///
/// Fetch and decode failures are terminal for one computation attempt and are
/// surfaced to the caller; the key stays eligible for a fresh request.
/// Windowing anomalies are never represented here — the resolver recovers
/// them locally by falling back to the full-image window.
#[derive(Debug, Clone, Error)]
pub enum NbrError {
    // === Input errors (surfaced) ===
    #[error("Failed to fetch band raster from {url}: {message}")]
    InputFetch { url: String, message: String },

    #[error("Failed to decode band raster from {url}: {message}")]
    InputDecode { url: String, message: String },

    #[error("Unsupported raster at {url}: {message}")]
    UnsupportedRaster { url: String, message: String },

    // === Coordination errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NbrError {
    /// True if a fresh `request` for the same key may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NbrError::InputFetch { .. } | NbrError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_errors_are_retryable() {
        let err = NbrError::InputFetch {
            url: "https://example.com/b8.tif".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decode_errors_are_not_retryable() {
        let err = NbrError::InputDecode {
            url: "https://example.com/b8.tif".to_string(),
            message: "not a TIFF".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
