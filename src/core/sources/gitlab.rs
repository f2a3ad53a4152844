use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::strategy::{ReleaseStrategy, SourceRelease};
use crate::core::assets::CandidateAsset;
use crate::core::error::{CatalogError, CatalogResult};

const GITLAB_API_BASE: &str = "https://gitlab.com/api/v4";
const GITLAB_WEB_BASE: &str = "https://gitlab.com";

lazy_static! {
    /// Markdown link to a project upload: `[label](/uploads/<secret>/<file>.wotmod)`
    static ref UPLOAD_LINK: Regex = Regex::new(
        r"\[[^\]]*\]\((/uploads/[^)\s]*/([^/)\s]+\.(?:mtmod|wotmod)))\)"
    )
    .unwrap();
}

/// Subset of a GitLab release entry.
#[derive(Debug, Deserialize)]
pub struct GitLabRelease {
    pub tag_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Collect candidate assets linked from a release description.
fn candidates_from_description(project_id: u64, description: &str) -> Vec<CandidateAsset> {
    UPLOAD_LINK
        .captures_iter(description)
        .filter_map(|caps| {
            let path = caps.get(1)?.as_str();
            let file = caps.get(2)?.as_str();
            let url = format!("{}/-/project/{}{}", GITLAB_WEB_BASE, project_id, path);
            CandidateAsset::parse(file, &url)
        })
        .collect()
}

/// Reads artifacts linked from the description of the most recent release.
///
/// Canary declarations are not supported for this source.
pub struct GitLabDescriptionStrategy {
    client: reqwest::Client,
    project_id: u64,
}

impl GitLabDescriptionStrategy {
    pub fn new(client: reqwest::Client, project_id: u64) -> Self {
        Self { client, project_id }
    }

    async fn fetch_releases(&self) -> CatalogResult<Vec<GitLabRelease>> {
        let url = format!("{}/projects/{}/releases", GITLAB_API_BASE, self.project_id);

        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(CatalogError::FetchFailed {
                source_name: format!("gitlab:{}", self.project_id),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json::<Vec<GitLabRelease>>().await?)
    }
}

#[async_trait]
impl ReleaseStrategy for GitLabDescriptionStrategy {
    async fn latest_release(&self) -> CatalogResult<SourceRelease> {
        let releases = self.fetch_releases().await?;

        // GitLab lists releases newest first; no releases means no candidates.
        let Some(latest) = releases.first() else {
            debug!("GitLab project {} has no releases", self.project_id);
            return Ok(SourceRelease::default());
        };

        let assets =
            candidates_from_description(self.project_id, latest.description.as_deref().unwrap_or(""));
        debug!(
            "GitLab project {} release {} links {} assets",
            self.project_id,
            latest.tag_name,
            assets.len()
        );

        Ok(SourceRelease {
            assets,
            declared_canary_percent: None,
        })
    }
}
