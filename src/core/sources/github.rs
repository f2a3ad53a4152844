use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::canary_marker::declared_canary_percent;
use super::strategy::{ReleaseStrategy, SourceRelease};
use crate::core::assets::CandidateAsset;
use crate::core::error::{CatalogError, CatalogResult};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Subset of GitHub's release object.
#[derive(Debug, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl GitHubRelease {
    fn into_source_release(self) -> SourceRelease {
        let declared_canary_percent = self.body.as_deref().and_then(declared_canary_percent);
        let assets = self
            .assets
            .iter()
            .filter_map(|a| CandidateAsset::parse(&a.name, &a.browser_download_url))
            .collect();

        SourceRelease {
            assets,
            declared_canary_percent,
        }
    }
}

/// Reads the `releases/latest` endpoint of one repository.
pub struct GitHubStrategy {
    client: reqwest::Client,
    owner: String,
    repo: String,
}

impl GitHubStrategy {
    pub fn new(client: reqwest::Client, owner: &str, repo: &str) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    async fn fetch_latest(&self) -> CatalogResult<GitHubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            GITHUB_API_BASE, self.owner, self.repo
        );

        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(CatalogError::FetchFailed {
                source_name: format!("github:{}/{}", self.owner, self.repo),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json::<GitHubRelease>().await?)
    }
}

#[async_trait]
impl ReleaseStrategy for GitHubStrategy {
    async fn latest_release(&self) -> CatalogResult<SourceRelease> {
        let release = self.fetch_latest().await?;
        debug!(
            "GitHub {}/{} latest release {} with {} assets",
            self.owner,
            self.repo,
            release.tag_name,
            release.assets.len()
        );
        Ok(release.into_source_release())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::VariantKind;

    #[test]
    fn release_assets_and_canary() {
        let json = r#"{
            "tag_name": "v1.4.0",
            "body": "Changelog\n- faster\n\n[canary: 30]",
            "assets": [
                {"name": "wotstat.analytics_1.4.0.wotmod", "browser_download_url": "https://gh/a.wotmod"},
                {"name": "wotstat.analytics_1.4.0.mtmod", "browser_download_url": "https://gh/a.mtmod"},
                {"name": "source.zip", "browser_download_url": "https://gh/source.zip"}
            ]
        }"#;
        let release: GitHubRelease = serde_json::from_str(json).unwrap();
        let source = release.into_source_release();

        assert_eq!(source.declared_canary_percent, Some(30.0));
        assert_eq!(source.assets.len(), 2);
        assert_eq!(source.assets[0].kind, VariantKind::Wotmod);
        assert_eq!(source.assets[1].download_url, "https://gh/a.mtmod");
    }

    #[test]
    fn missing_body_declares_no_canary() {
        let json = r#"{"tag_name": "v1", "body": null, "assets": []}"#;
        let release: GitHubRelease = serde_json::from_str(json).unwrap();
        let source = release.into_source_release();
        assert_eq!(source.declared_canary_percent, None);
        assert!(source.assets.is_empty());
    }
}
