use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::commit::{commit_variant, plan_variants, VariantCommit};
use crate::core::assets::ResolvedAssets;
use crate::core::catalog::CatalogStore;
use crate::core::config::{CatalogConfig, CatalogEntry, EntrySource};
use crate::core::downloader::{ContentStore, Downloader, ResolvedArtifact};
use crate::core::error::{CatalogError, CatalogResult};
use crate::core::sources::ReleaseFeed;

/// Result of one mod within a pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModStatus {
    /// No upstream source; only manual uploads.
    Placeholder,
    /// The latest release had no matching artifacts.
    NoArtifacts,
    Committed { variants: Vec<VariantCommit> },
    Failed { error: String, transient: bool },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModOutcome {
    pub tag: String,
    #[serde(flatten)]
    pub status: ModStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PruneFailure {
    pub tag: String,
    pub error: String,
}

/// Per-mod outcomes of a full pass plus the prune step. A pass never fails
/// as a whole.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PassReport {
    pub outcomes: Vec<ModOutcome>,
    pub pruned: Vec<String>,
    pub prune_failures: Vec<PruneFailure>,
}

impl PassReport {
    pub fn failed(&self) -> impl Iterator<Item = &ModOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ModStatus::Failed { .. }))
    }

    pub fn outcome(&self, tag: &str) -> Option<&ModStatus> {
        self.outcomes.iter().find(|o| o.tag == tag).map(|o| &o.status)
    }
}

/// Drives reconciliation passes and owns the single-writer guard.
///
/// Every catalog mutation (passes and manual uploads) runs while holding
/// `write_guard`, so no two writers ever race on the same record key.
pub struct Reconciler {
    pub(super) config: Arc<CatalogConfig>,
    pub(super) store: Arc<CatalogStore>,
    pub(super) content: ContentStore,
    feed: Arc<dyn ReleaseFeed>,
    downloader: Downloader,
    pub(super) write_guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        config: Arc<CatalogConfig>,
        store: Arc<CatalogStore>,
        content: ContentStore,
        feed: Arc<dyn ReleaseFeed>,
        downloader: Downloader,
    ) -> Self {
        Self {
            config,
            store,
            content,
            feed,
            downloader,
            write_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Run a pass, waiting for any pass or upload in flight to finish first.
    pub async fn run_pass(&self) -> PassReport {
        let _guard = self.write_guard.lock().await;
        self.run_pass_locked().await
    }

    /// Run a pass unless another writer is active; `None` when skipped.
    pub async fn try_run_pass(&self) -> Option<PassReport> {
        let Ok(_guard) = self.write_guard.try_lock() else {
            info!("Reconciliation already in progress, skipping this trigger");
            return None;
        };
        Some(self.run_pass_locked().await)
    }

    async fn run_pass_locked(&self) -> PassReport {
        info!("Loading mods...");
        let mut report = PassReport::default();

        for entry in self.config.entries() {
            let status = match self.sync_mod(entry).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(tag = %entry.tag, error = %e, "mod sync failed; keeping stored state");
                    ModStatus::Failed {
                        error: e.to_string(),
                        transient: e.is_transient(),
                    }
                }
            };
            report.outcomes.push(ModOutcome {
                tag: entry.tag.clone(),
                status,
            });
        }

        self.prune(&mut report).await;

        info!(
            "Mods loaded: {} mods, {} failed, {} pruned",
            report.outcomes.len(),
            report.failed().count(),
            report.pruned.len()
        );
        report
    }

    async fn sync_mod(&self, entry: &CatalogEntry) -> CatalogResult<ModStatus> {
        let descriptor = match &entry.source {
            EntrySource::Manual => return Ok(ModStatus::Placeholder),
            EntrySource::Invalid(reason) => {
                return Err(CatalogError::InvalidConfig(format!(
                    "source of {}: {}",
                    entry.tag, reason
                )))
            }
            EntrySource::Remote(descriptor) => descriptor,
        };

        let release = self.feed.latest_release(descriptor).await?;
        let resolved = ResolvedAssets::resolve(release.assets)?;
        let plan = plan_variants(&resolved, entry.variant_restriction);

        if plan.is_empty() {
            info!("No mod files found for tag: {}", entry.tag);
            return Ok(ModStatus::NoArtifacts);
        }

        // Download everything first so a failed download leaves the stored
        // state of every variant untouched.
        let mut downloaded: Vec<(String, ResolvedArtifact)> = Vec::new();
        for (_, candidate) in &plan {
            if downloaded.iter().any(|(url, _)| *url == candidate.download_url) {
                continue;
            }
            let artifact = self.downloader.download(candidate).await?;
            downloaded.push((candidate.download_url.clone(), artifact));
        }

        let now = Utc::now();
        let mut variants = Vec::with_capacity(plan.len());
        for (kind, candidate) in &plan {
            let Some((_, artifact)) = downloaded
                .iter()
                .find(|(url, _)| *url == candidate.download_url)
            else {
                continue;
            };
            let commit = commit_variant(
                &self.store,
                &self.content,
                &entry.tag,
                *kind,
                artifact,
                release.declared_canary_percent,
                now,
            )
            .await?;
            variants.push(commit);
        }

        Ok(ModStatus::Committed { variants })
    }

    /// Delete every stored tag that is no longer configured.
    ///
    /// Records go first so no row ever points at a deleted blob. A failure on
    /// one tag does not stop the others.
    async fn prune(&self, report: &mut PassReport) {
        let configured = self.config.tags();

        let mut stored: BTreeSet<String> = match self.store.stored_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(error = %e, "cannot list stored tags; skipping prune");
                return;
            }
        };
        match self.content.tag_dirs().await {
            Ok(dirs) => stored.extend(dirs),
            Err(e) => warn!(error = %e, "cannot list blob directories"),
        }

        for tag in stored.difference(&configured) {
            let result = async {
                self.store.delete_tag(tag).await?;
                self.content.remove_tag(tag).await
            }
            .await;

            match result {
                Ok(()) => {
                    info!("Pruned tag no longer in catalog: {}", tag);
                    report.pruned.push(tag.clone());
                }
                Err(e) => {
                    warn!(tag = %tag, error = %e, "failed to prune stale tag");
                    report.prune_failures.push(PruneFailure {
                        tag: tag.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}
