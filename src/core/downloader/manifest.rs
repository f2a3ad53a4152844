use std::io::{Cursor, Read};

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::{CatalogError, CatalogResult};

/// Archive entry that describes the packaged mod.
pub const MANIFEST_ENTRY: &str = "meta.xml";

/// Minimal `meta.xml` model – only the fields the catalog keys on.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ModManifest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl ModManifest {
    /// Parse a `meta.xml` document.
    pub fn parse(xml: &str) -> CatalogResult<Self> {
        let mut doc: ModManifest =
            from_str(xml).map_err(|e| CatalogError::ManifestParse(e.to_string()))?;
        doc.id = doc.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        doc.version = doc.version.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(doc)
    }

    /// Open `bytes` as a zip archive and read its manifest.
    ///
    /// `Ok(None)` when the archive has no manifest entry.
    pub fn from_archive(bytes: &[u8]) -> CatalogResult<Option<Self>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut entry = match archive.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| CatalogError::ManifestParse(e.to_string()))?;

        Self::parse(xml.trim_start_matches('\u{feff}')).map(Some)
    }
}
