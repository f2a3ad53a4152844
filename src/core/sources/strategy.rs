use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{github::GitHubStrategy, gitlab::GitLabDescriptionStrategy};
use crate::core::assets::CandidateAsset;
use crate::core::error::CatalogResult;

/// Where a catalog entry's releases are published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceDescriptor {
    Github {
        owner: String,
        repo: String,
    },
    GitlabDescription {
        #[serde(rename = "repoId")]
        repo_id: u64,
        /// Human-readable project path, only used in logs.
        #[serde(default)]
        repo: Option<String>,
    },
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Github { owner, repo } => write!(f, "github:{owner}/{repo}"),
            SourceDescriptor::GitlabDescription { repo_id, repo } => match repo {
                Some(repo) => write!(f, "gitlab:{repo} ({repo_id})"),
                None => write!(f, "gitlab:{repo_id}"),
            },
        }
    }
}

/// Candidates found in the latest upstream release.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRelease {
    /// Every asset whose name matched the mod pattern; the rest are dropped.
    pub assets: Vec<CandidateAsset>,
    /// Canary percentage declared by the release, `None` when not declared.
    pub declared_canary_percent: Option<f64>,
}

#[async_trait]
pub trait ReleaseStrategy: Send + Sync {
    async fn latest_release(&self) -> CatalogResult<SourceRelease>;
}

/// Static dispatch over the supported upstream kinds.
pub enum Strategy {
    GitHub(GitHubStrategy),
    GitLabDescription(GitLabDescriptionStrategy),
}

impl Strategy {
    pub fn new(source: &SourceDescriptor, client: reqwest::Client) -> Self {
        match source {
            SourceDescriptor::Github { owner, repo } => {
                Self::GitHub(GitHubStrategy::new(client, owner, repo))
            }
            SourceDescriptor::GitlabDescription { repo_id, .. } => {
                Self::GitLabDescription(GitLabDescriptionStrategy::new(client, *repo_id))
            }
        }
    }

    pub async fn latest_release(&self) -> CatalogResult<SourceRelease> {
        match self {
            Strategy::GitHub(s) => s.latest_release().await,
            Strategy::GitLabDescription(s) => s.latest_release().await,
        }
    }
}

/// What the reconciler talks to: descriptor in, latest release out.
///
/// Strategies only read upstream; they never touch the catalog.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    async fn latest_release(&self, source: &SourceDescriptor) -> CatalogResult<SourceRelease>;
}

/// Release feed backed by the real upstream APIs.
pub struct HttpReleaseFeed {
    client: reqwest::Client,
}

impl HttpReleaseFeed {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn latest_release(&self, source: &SourceDescriptor) -> CatalogResult<SourceRelease> {
        Strategy::new(source, self.client.clone())
            .latest_release()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_descriptors() {
        let gh: SourceDescriptor =
            serde_json::from_str(r#"{"type":"github","owner":"wotstat","repo":"wotstat-analytics"}"#)
                .unwrap();
        assert_eq!(gh.to_string(), "github:wotstat/wotstat-analytics");

        let gl: SourceDescriptor = serde_json::from_str(
            r#"{"type":"gitlab-description","repo":"wot-public-mods/mods-list","repoId":26509092}"#,
        )
        .unwrap();
        assert_eq!(
            gl,
            SourceDescriptor::GitlabDescription {
                repo_id: 26509092,
                repo: Some("wot-public-mods/mods-list".into()),
            }
        );
    }

    #[test]
    fn unknown_source_kind_is_rejected() {
        let err = serde_json::from_str::<SourceDescriptor>(r#"{"type":"bitbucket","repo":"x"}"#);
        assert!(err.is_err());
    }
}
