use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::CatalogError;

/// Target platform flavour of a mod artifact, named after its file extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Mtmod,
    Wotmod,
}

impl VariantKind {
    pub const ALL: [VariantKind; 2] = [VariantKind::Mtmod, VariantKind::Wotmod];

    /// File extension (without the dot), also the value stored in the catalog.
    pub fn extension(self) -> &'static str {
        match self {
            VariantKind::Mtmod => "mtmod",
            VariantKind::Wotmod => "wotmod",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for VariantKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mtmod" => Ok(VariantKind::Mtmod),
            "wotmod" => Ok(VariantKind::Wotmod),
            other => Err(CatalogError::Other(format!("unknown variant kind {other:?}"))),
        }
    }
}

/// Restricts a catalog entry to a single variant kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum VariantRestriction {
    MtOnly,
    WotOnly,
}

impl VariantRestriction {
    pub fn kind(self) -> VariantKind {
        match self {
            VariantRestriction::MtOnly => VariantKind::Mtmod,
            VariantRestriction::WotOnly => VariantKind::Wotmod,
        }
    }

    pub fn allows(self, kind: VariantKind) -> bool {
        self.kind() == kind
    }
}

impl FromStr for VariantRestriction {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mt-only" => Ok(VariantRestriction::MtOnly),
            "wot-only" => Ok(VariantRestriction::WotOnly),
            other => Err(CatalogError::Validation(format!(
                "unknown variant restriction {other:?}"
            ))),
        }
    }
}

/// Canary rollout attached to a stored artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Canary {
    /// When the current rollout began. Preserved across percent-only changes.
    pub published_at: DateTime<Utc>,
    pub percent: f64,
}

/// One persisted row of the catalog, keyed by `(tag, logical_id, variant)`.
///
/// A newer accepted artifact for the same key replaces the row; no history
/// beyond the current row is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ModVariantRecord {
    pub tag: String,
    pub logical_id: String,
    pub variant: VariantKind,
    pub version: Option<String>,
    pub content_hash: String,
    pub filename: String,
    /// Path relative to the content store root, e.g. `mods/{tag}/{hash}/{file}`.
    pub storage_url: String,
    pub inserted_at: DateTime<Utc>,
    pub canary: Option<Canary>,
}

/// A record as exposed through the read API.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedMod {
    pub id: String,
    pub filename: String,
    pub version: Option<String>,
    pub content_hash: String,
    pub download_url: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<Canary>,
}

impl PublishedMod {
    pub fn from_record(record: &ModVariantRecord, public_base_url: &str) -> Self {
        let download_url = if public_base_url.is_empty() {
            format!("/{}", record.storage_url)
        } else {
            format!(
                "{}/{}",
                public_base_url.trim_end_matches('/'),
                record.storage_url
            )
        };

        Self {
            id: record.logical_id.clone(),
            filename: record.filename.clone(),
            version: record.version.clone(),
            content_hash: record.content_hash.clone(),
            download_url,
            date: record.inserted_at,
            canary: record.canary,
        }
    }
}

/// Every stored record of one tag, split by variant kind, oldest first.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TagVersions {
    pub mtmod: Vec<PublishedMod>,
    pub wotmod: Vec<PublishedMod>,
}

impl TagVersions {
    pub fn push(&mut self, kind: VariantKind, published: PublishedMod) {
        match kind {
            VariantKind::Mtmod => self.mtmod.push(published),
            VariantKind::Wotmod => self.wotmod.push(published),
        }
    }
}

/// Most recently inserted record of one tag per variant kind.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TagLatest {
    pub mtmod: Option<PublishedMod>,
    pub wotmod: Option<PublishedMod>,
}

impl From<&TagVersions> for TagLatest {
    fn from(versions: &TagVersions) -> Self {
        Self {
            mtmod: versions.mtmod.last().cloned(),
            wotmod: versions.wotmod.last().cloned(),
        }
    }
}

pub type AllVersions = BTreeMap<String, TagVersions>;
pub type LatestVersions = BTreeMap<String, TagLatest>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(storage_url: &str) -> ModVariantRecord {
        ModVariantRecord {
            tag: "wotstat.analytics".into(),
            logical_id: "wotstat.analytics".into(),
            variant: VariantKind::Wotmod,
            version: Some("1.4.0".into()),
            content_hash: "abc".into(),
            filename: "wotstat.analytics_1.4.0.wotmod".into(),
            storage_url: storage_url.into(),
            inserted_at: Utc::now(),
            canary: None,
        }
    }

    #[test]
    fn download_url_joins_public_base() {
        let r = record("mods/t/abc/a.wotmod");
        assert_eq!(
            PublishedMod::from_record(&r, "https://cdn.example.com/").download_url,
            "https://cdn.example.com/mods/t/abc/a.wotmod"
        );
        assert_eq!(
            PublishedMod::from_record(&r, "").download_url,
            "/mods/t/abc/a.wotmod"
        );
    }

    #[test]
    fn canary_is_omitted_when_absent() {
        let json = serde_json::to_value(PublishedMod::from_record(&record("x"), "")).unwrap();
        assert!(json.get("canary").is_none());
        assert_eq!(json["contentHash"], "abc");
    }

    #[test]
    fn restriction_names() {
        assert_eq!(
            "mt-only".parse::<VariantRestriction>().unwrap(),
            VariantRestriction::MtOnly
        );
        assert!(VariantRestriction::WotOnly.allows(VariantKind::Wotmod));
        assert!(!VariantRestriction::WotOnly.allows(VariantKind::Mtmod));
        assert!("both".parse::<VariantRestriction>().is_err());
    }
}
