use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::core::catalog::CatalogStore;
use crate::core::config::{CatalogConfig, Settings};
use crate::core::downloader::{ContentStore, Downloader, HttpArtifactFetcher};
use crate::core::error::{CatalogError, CatalogResult};
use crate::core::http::build_http_client;
use crate::core::sources::HttpReleaseFeed;
use crate::core::sync::Reconciler;

/// Everything the HTTP façade and the scheduler share.
pub struct AppState {
    pub settings: Settings,
    pub reconciler: Arc<Reconciler>,
    pub content: ContentStore,
}

impl AppState {
    /// Open the store, load the catalog and wire the reconciler.
    pub async fn initialize(settings: Settings) -> CatalogResult<Self> {
        tokio::fs::create_dir_all(&settings.data_dir)
            .await
            .map_err(|e| CatalogError::Io {
                path: settings.data_dir.clone(),
                source: e,
            })?;

        let store = CatalogStore::connect(&settings.database_url, &settings.public_base_url).await?;
        let config = CatalogConfig::load(settings.catalog_path.as_deref()).await?;
        let client = build_http_client(settings.http_timeout)?;
        let content = ContentStore::new(settings.data_dir.clone());

        let reconciler = Reconciler::new(
            Arc::new(config),
            Arc::new(store),
            content.clone(),
            Arc::new(HttpReleaseFeed::new(client.clone())),
            Downloader::new(Arc::new(HttpArtifactFetcher::new(client))),
        );

        info!(
            "State ready: data dir {:?}, {} catalog entries",
            settings.data_dir,
            reconciler.config().entries().len()
        );

        Ok(Self {
            settings,
            reconciler: Arc::new(reconciler),
            content,
        })
    }

    /// Directory served under `/mods`.
    pub fn mods_dir(&self) -> PathBuf {
        self.content.root().join("mods")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_creates_data_dir_and_database() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("nested/store");
        let settings = Settings {
            database_url: format!("sqlite://{}", data_dir.join("mods.sqlite").display()),
            data_dir: data_dir.clone(),
            ..Settings::default()
        };

        let state = AppState::initialize(settings).await.unwrap();

        assert!(data_dir.join("mods.sqlite").is_file());
        assert_eq!(state.mods_dir(), data_dir.join("mods"));
        assert_eq!(state.reconciler.config().entries().len(), 5);
    }
}
