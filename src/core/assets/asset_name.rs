use lazy_static::lazy_static;
use regex::Regex;

use crate::core::catalog::VariantKind;

lazy_static! {
    /// `<tag prefix>[_<dotted version>].<mtmod|wotmod>`
    static ref ASSET_NAME: Regex =
        Regex::new(r"^(.*?)_?((?:\d+\.)*\d+)?\.(mtmod|wotmod)$").unwrap();
}

/// A release asset whose filename matched the mod naming pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAsset {
    pub full_name: String,
    pub name_without_extension: String,
    pub tag_prefix: String,
    /// Dotted version from the filename, `""` when the name carries none.
    pub version: String,
    pub kind: VariantKind,
    pub download_url: String,
}

impl CandidateAsset {
    /// Parse a raw asset filename.
    ///
    /// Returns `None` for files that do not follow the pattern; those are
    /// ignored by callers rather than treated as errors.
    ///
    /// # Examples
    /// ```
    /// use mods_catalog::core::assets::CandidateAsset;
    /// let a = CandidateAsset::parse("wotstat.analytics_1.4.0.wotmod", "https://x").unwrap();
    /// assert_eq!(a.version, "1.4.0");
    /// ```
    pub fn parse(name: &str, download_url: &str) -> Option<Self> {
        let caps = ASSET_NAME.captures(name)?;
        let kind = match caps.get(3)?.as_str() {
            "mtmod" => VariantKind::Mtmod,
            "wotmod" => VariantKind::Wotmod,
            _ => return None,
        };
        let extension_len = kind.extension().len() + 1;

        Some(Self {
            full_name: name.to_string(),
            name_without_extension: name[..name.len() - extension_len].to_string(),
            tag_prefix: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
            version: caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
            kind,
            download_url: download_url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_version_and_kind() {
        let a = CandidateAsset::parse("wotstat.analytics_1.4.0.2.wotmod", "u").unwrap();
        assert_eq!(a.tag_prefix, "wotstat.analytics");
        assert_eq!(a.version, "1.4.0.2");
        assert_eq!(a.kind, VariantKind::Wotmod);
        assert_eq!(a.name_without_extension, "wotstat.analytics_1.4.0.2");
        assert_eq!(a.full_name, "wotstat.analytics_1.4.0.2.wotmod");
    }

    #[test]
    fn version_is_optional() {
        let a = CandidateAsset::parse("izeberg.modssettingsapi.mtmod", "u").unwrap();
        assert_eq!(a.tag_prefix, "izeberg.modssettingsapi");
        assert_eq!(a.version, "");
        assert_eq!(a.kind, VariantKind::Mtmod);
    }

    #[test]
    fn version_without_underscore() {
        let a = CandidateAsset::parse("mod2.1.wotmod", "u").unwrap();
        assert_eq!(a.tag_prefix, "mod");
        assert_eq!(a.version, "2.1");
    }

    #[test]
    fn other_extensions_do_not_match() {
        assert!(CandidateAsset::parse("wotstat.analytics_1.4.0.zip", "u").is_none());
        assert!(CandidateAsset::parse("readme.md", "u").is_none());
        assert!(CandidateAsset::parse("mod.wotmod.sig", "u").is_none());
    }
}
