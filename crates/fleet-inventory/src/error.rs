//! Error types for inventory collection.

use thiserror::Error;

/// Errors raised while discovering regions or listing instances.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// No region list could be obtained and no fallback region is known.
    #[error("Region discovery failed: {0}")]
    RegionDiscoveryFailed(String),

    /// A listing backend reported a failure.
    #[error("Listing backend error ({code}): {message}")]
    Backend { code: String, message: String },

    /// The backend kept returning continuation tokens past the page cap.
    #[error("Stopped after {max_pages} pages in {region}")]
    PageLimitExceeded { region: String, max_pages: usize },

    /// The backend handed back a continuation token it had already issued.
    #[error("Backend repeated continuation token in {region}")]
    RepeatedPageToken { region: String },

    /// No usable credentials or session.
    #[error("Session check failed: {0}")]
    Session(String),
}

impl InventoryError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &str {
        match self {
            Self::RegionDiscoveryFailed(_) => "region_discovery_failed",
            Self::Backend { code, .. } => code,
            Self::PageLimitExceeded { .. } => "page_limit_exceeded",
            Self::RepeatedPageToken { .. } => "repeated_page_token",
            Self::Session(_) => "session_failed",
        }
    }
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;
