mod client;
mod content_store;
mod manifest;

pub use client::{content_hash, ArtifactFetcher, Downloader, HttpArtifactFetcher, ResolvedArtifact};
pub use content_store::ContentStore;
pub use manifest::{ModManifest, MANIFEST_ENTRY};

#[cfg(test)]
pub(crate) use manifest::tests::zip_bytes;
