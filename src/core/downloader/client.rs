use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::manifest::ModManifest;
use crate::core::assets::CandidateAsset;
use crate::core::error::{CatalogError, CatalogResult};

/// Upper bound on a single artifact held in memory.
const MAX_ARTIFACT_BYTES: usize = 256 * 1024 * 1024;

/// Fetches raw artifact bytes.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CatalogResult<Bytes>;
}

/// Plain HTTP GET through the shared client.
pub struct HttpArtifactFetcher {
    client: Client,
}

impl HttpArtifactFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str) -> CatalogResult<Bytes> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_ARTIFACT_BYTES {
                return Err(CatalogError::Other(format!(
                    "{url} exceeds {MAX_ARTIFACT_BYTES} bytes"
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded: {} ({} bytes)", url, body.len());
        Ok(body.freeze())
    }
}

/// A downloaded artifact, hashed and identified.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    pub bytes: Bytes,
    /// Manifest id, or the filename's tag prefix when there is none.
    pub logical_id: String,
    pub logical_version: Option<String>,
    /// SHA-256 of the raw bytes, lowercase hex.
    pub content_hash: String,
    pub full_name: String,
    pub name_without_extension: String,
}

/// SHA-256 over the bytes as downloaded, not over the archive contents.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl ResolvedArtifact {
    /// Hash the bytes and read the embedded manifest.
    ///
    /// An unreadable archive or manifest is not fatal: the blob is kept and
    /// the id falls back to the candidate's tag prefix with no version.
    pub fn inspect(candidate: &CandidateAsset, bytes: Bytes) -> Self {
        let manifest = match ModManifest::from_archive(&bytes) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                warn!(
                    "Unreadable archive {}, continuing without manifest: {}",
                    candidate.full_name, e
                );
                ModManifest::default()
            }
        };

        Self {
            content_hash: content_hash(&bytes),
            logical_id: manifest
                .id
                .unwrap_or_else(|| candidate.tag_prefix.clone()),
            logical_version: manifest.version,
            full_name: candidate.full_name.clone(),
            name_without_extension: candidate.name_without_extension.clone(),
            bytes,
        }
    }
}

/// Content-addressing downloader used by the reconciler.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch a resolved candidate and identify it.
    pub async fn download(&self, candidate: &CandidateAsset) -> CatalogResult<ResolvedArtifact> {
        let bytes = self.fetcher.fetch(&candidate.download_url).await?;
        Ok(ResolvedArtifact::inspect(candidate, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::zip_bytes;

    #[test]
    fn sha256_hex_of_raw_bytes() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn manifest_supplies_id_and_version() {
        let candidate = CandidateAsset::parse("prefix_1.0.wotmod", "u").unwrap();
        let bytes = zip_bytes(&[("meta.xml", "<root><id>real.id</id><version>1.0.3</version></root>")]);

        let artifact = ResolvedArtifact::inspect(&candidate, Bytes::from(bytes.clone()));

        assert_eq!(artifact.logical_id, "real.id");
        assert_eq!(artifact.logical_version.as_deref(), Some("1.0.3"));
        assert_eq!(artifact.content_hash, content_hash(&bytes));
        assert_eq!(artifact.name_without_extension, "prefix_1.0");
    }

    #[test]
    fn broken_archive_degrades_to_prefix() {
        let candidate = CandidateAsset::parse("prefix_1.0.mtmod", "u").unwrap();
        let artifact = ResolvedArtifact::inspect(&candidate, Bytes::from_static(b"not a zip"));

        assert_eq!(artifact.logical_id, "prefix");
        assert_eq!(artifact.logical_version, None);
        assert_eq!(artifact.bytes, Bytes::from_static(b"not a zip"));
    }
}
