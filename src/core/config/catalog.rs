use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::catalog::VariantRestriction;
use crate::core::error::{CatalogError, CatalogResult};
use crate::core::sources::SourceDescriptor;

/// How a catalog entry gets its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Placeholder: only manual uploads.
    Manual,
    Remote(SourceDescriptor),
    /// The `source` object could not be decoded. The tag still counts as
    /// configured; every pass reports a configuration error for it.
    Invalid(String),
}

/// One configured mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub tag: String,
    pub variant_restriction: Option<VariantRestriction>,
    pub upload_token: Option<String>,
    pub source: EntrySource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    tag: String,
    #[serde(default)]
    variant_restriction: Option<VariantRestriction>,
    #[serde(default)]
    upload_token: Option<String>,
    #[serde(default)]
    source: Option<serde_json::Value>,
}

impl RawEntry {
    fn into_entry(self) -> CatalogEntry {
        let source = match self.source {
            None | Some(serde_json::Value::Null) => EntrySource::Manual,
            Some(raw) => match serde_json::from_value::<SourceDescriptor>(raw) {
                Ok(descriptor) => EntrySource::Remote(descriptor),
                Err(e) => {
                    warn!("Catalog entry {} has an unusable source: {}", self.tag, e);
                    EntrySource::Invalid(e.to_string())
                }
            },
        };

        CatalogEntry {
            tag: self.tag,
            variant_restriction: self.variant_restriction,
            upload_token: self.upload_token.filter(|t| !t.is_empty()),
            source,
        }
    }
}

/// Ordered, immutable list of configured mods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogConfig {
    entries: Vec<CatalogEntry>,
}

/// Tags become directory names in the content store.
fn validate_tag(tag: &str) -> CatalogResult<()> {
    let bad = tag.trim().is_empty()
        || tag != tag.trim()
        || tag.contains(['/', '\\'])
        || tag == "."
        || tag.contains("..");
    if bad {
        return Err(CatalogError::InvalidConfig(format!("invalid tag {tag:?}")));
    }
    Ok(())
}

impl CatalogConfig {
    pub fn new(entries: Vec<CatalogEntry>) -> CatalogResult<Self> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            validate_tag(&entry.tag)?;
            if !seen.insert(entry.tag.as_str()) {
                return Err(CatalogError::InvalidConfig(format!(
                    "duplicate tag {:?}",
                    entry.tag
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a JSON catalog document.
    pub fn parse(json: &str) -> CatalogResult<Self> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        Self::new(raw.into_iter().map(RawEntry::into_entry).collect())
    }

    /// Load the catalog file, or the built-in catalog when no path is given.
    pub async fn load(path: Option<&Path>) -> CatalogResult<Self> {
        let Some(path) = path else {
            let config = Self::builtin();
            info!("Using built-in catalog ({} mods)", config.entries.len());
            return Ok(config);
        };

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        let config = Self::parse(&json)?;
        info!("Loaded catalog {:?} ({} mods)", path, config.entries.len());
        Ok(config)
    }

    /// The production catalog.
    pub fn builtin() -> Self {
        let github = |owner: &str, repo: &str| {
            EntrySource::Remote(SourceDescriptor::Github {
                owner: owner.into(),
                repo: repo.into(),
            })
        };
        let entry = |tag: &str, source: EntrySource| CatalogEntry {
            tag: tag.into(),
            variant_restriction: None,
            upload_token: None,
            source,
        };

        Self {
            entries: vec![
                entry("wotstat.analytics", github("wotstat", "wotstat-analytics")),
                entry("wotstat.positions", EntrySource::Manual),
                entry("wotstat.widgets", EntrySource::Manual),
                entry(
                    "me.poliroid.modslistapi-wotstat",
                    EntrySource::Remote(SourceDescriptor::GitlabDescription {
                        repo_id: 26509092,
                        repo: Some("wot-public-mods/mods-list".into()),
                    }),
                ),
                entry("izeberg.modssettingsapi", github("izeberg", "modssettingsapi")),
            ],
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, tag: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.tag.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_catalog_document() {
        let json = r#"[
            {"tag": "wotstat.analytics", "source": {"type": "github", "owner": "wotstat", "repo": "wotstat-analytics"}},
            {"tag": "wotstat.widgets", "variantRestriction": "wot-only", "uploadToken": "s3cret"},
            {"tag": "broken", "source": {"type": "bitbucket"}}
        ]"#;
        let config = CatalogConfig::parse(json).unwrap();

        assert_eq!(config.entries().len(), 3);
        assert!(matches!(config.entries()[0].source, EntrySource::Remote(_)));

        let widgets = config.get("wotstat.widgets").unwrap();
        assert_eq!(widgets.source, EntrySource::Manual);
        assert_eq!(widgets.variant_restriction, Some(VariantRestriction::WotOnly));
        assert_eq!(widgets.upload_token.as_deref(), Some("s3cret"));

        assert!(matches!(config.get("broken").unwrap().source, EntrySource::Invalid(_)));
        assert!(config.tags().contains("broken"));
    }

    #[test]
    fn rejects_path_like_tags() {
        for tag in ["", "../etc", "a/b", "a\\b", "."] {
            let json = format!(r#"[{{"tag": {}}}]"#, serde_json::to_string(tag).unwrap());
            assert!(CatalogConfig::parse(&json).is_err(), "tag {tag:?} accepted");
        }
    }

    #[test]
    fn rejects_duplicate_tags() {
        let json = r#"[{"tag": "a"}, {"tag": "a"}]"#;
        assert!(matches!(
            CatalogConfig::parse(json),
            Err(CatalogError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let builtin = CatalogConfig::builtin();
        assert!(CatalogConfig::new(builtin.entries().to_vec()).is_ok());
        assert_eq!(builtin.tags().len(), 5);
    }
}
