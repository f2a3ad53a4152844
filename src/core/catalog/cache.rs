use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::model::{AllVersions, LatestVersions, TagLatest};
use crate::core::error::CatalogResult;

#[derive(Default)]
struct Slots {
    all: Option<Arc<AllVersions>>,
    latest: Option<Arc<LatestVersions>>,
}

/// Memoized public views of the catalog.
///
/// Empty at construction and after every [`ViewCache::invalidate`]; each view
/// is built on its first read and then shared by reference until the next
/// committed write. Building and invalidating take the same lock, so a view
/// computed from pre-write rows can never be stored after the write's
/// invalidation.
#[derive(Default)]
pub struct ViewCache {
    slots: Mutex<Slots>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn invalidate(&self) {
        let mut slots = self.slots.lock().await;
        *slots = Slots::default();
    }

    pub async fn all_versions<F, Fut>(&self, build: F) -> CatalogResult<Arc<AllVersions>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<AllVersions>>,
    {
        let mut slots = self.slots.lock().await;
        if let Some(all) = &slots.all {
            return Ok(Arc::clone(all));
        }

        let all = Arc::new(build().await?);
        slots.all = Some(Arc::clone(&all));
        Ok(all)
    }

    pub async fn latest_versions<F, Fut>(&self, build: F) -> CatalogResult<Arc<LatestVersions>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<AllVersions>>,
    {
        let mut slots = self.slots.lock().await;
        if let Some(latest) = &slots.latest {
            return Ok(Arc::clone(latest));
        }

        let all = match &slots.all {
            Some(all) => Arc::clone(all),
            None => {
                let all = Arc::new(build().await?);
                slots.all = Some(Arc::clone(&all));
                all
            }
        };

        let latest: LatestVersions = all
            .iter()
            .map(|(tag, versions)| (tag.clone(), TagLatest::from(versions)))
            .collect();
        let latest = Arc::new(latest);
        slots.latest = Some(Arc::clone(&latest));
        Ok(latest)
    }
}
