use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the catalog backend.
/// Every module returns `Result<T, CatalogError>`.
#[derive(Debug, Error)]
pub enum CatalogError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Release feed {source_name} returned HTTP {status}")]
    FetchFailed { source_name: String, status: u16 },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Manifest ────────────────────────────────────────
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Catalog store ───────────────────────────────────
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Invalid version string: {0:?}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upload ──────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized to upload for tag {0}")]
    Unauthorized(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Upstream or network trouble that may clear up on the next pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Http(_)
                | CatalogError::FetchFailed { .. }
                | CatalogError::DownloadFailed { .. }
        )
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(source: std::io::Error) -> Self {
        CatalogError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
