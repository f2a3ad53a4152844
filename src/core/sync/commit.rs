use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::assets::{CandidateAsset, ResolvedAssets};
use crate::core::canary::{advance, CanaryDecision, CanaryState};
use crate::core::catalog::{CatalogStore, ModVariantRecord, VariantKind, VariantRestriction};
use crate::core::downloader::{ContentStore, ResolvedArtifact};
use crate::core::error::CatalogResult;

/// What a commit did to the catalog row of one variant.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Inserted,
    Replaced,
    CanaryUpdated,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VariantCommit {
    pub variant: VariantKind,
    pub logical_id: String,
    pub content_hash: String,
    pub outcome: CommitOutcome,
}

/// Which candidate gets written under which variant kind.
///
/// A kind with no candidate of its own borrows the other kind's artifact
/// (one binary serving both platforms); a restriction then keeps only its
/// own kind.
pub fn plan_variants(
    resolved: &ResolvedAssets,
    restriction: Option<VariantRestriction>,
) -> Vec<(VariantKind, CandidateAsset)> {
    VariantKind::ALL
        .into_iter()
        .filter(|kind| restriction.map_or(true, |r| r.allows(*kind)))
        .filter_map(|kind| {
            let own = resolved.get(kind);
            let fallback = VariantKind::ALL
                .into_iter()
                .filter(|other| *other != kind)
                .find_map(|other| resolved.get(other));
            own.or(fallback).map(|candidate| (kind, candidate.clone()))
        })
        .collect()
}

/// Store one artifact under one variant kind of `tag`.
///
/// The blob is written before the catalog row, so a committed row always
/// points at bytes already on disk. The cache is only invalidated by the
/// store once a row actually changes.
pub async fn commit_variant(
    store: &CatalogStore,
    content: &ContentStore,
    tag: &str,
    kind: VariantKind,
    artifact: &ResolvedArtifact,
    declared_canary: Option<f64>,
    now: DateTime<Utc>,
) -> CatalogResult<VariantCommit> {
    let storage_url = ContentStore::storage_url(
        tag,
        &artifact.content_hash,
        &artifact.name_without_extension,
        kind,
    );
    if content.put_if_absent(&storage_url, &artifact.bytes).await? {
        info!(
            "Mod file saved: {}: {}.{} ({})",
            tag, artifact.name_without_extension, kind, artifact.content_hash
        );
    }

    let existing = store.find(tag, &artifact.logical_id, kind).await?;
    let same_artifact = existing
        .as_ref()
        .filter(|r| r.content_hash == artifact.content_hash);
    let current = same_artifact.map(|r| CanaryState::from_stored(r.canary));

    let outcome = match advance(current, declared_canary, now) {
        CanaryDecision::Keep => {
            debug!("{} {} unchanged ({})", tag, kind, artifact.content_hash);
            CommitOutcome::Unchanged
        }
        CanaryDecision::Set(state) if same_artifact.is_some() => {
            store
                .update_canary(tag, &artifact.logical_id, kind, state.into_stored())
                .await?;
            info!("{} {} canary now {:?}", tag, kind, state);
            CommitOutcome::CanaryUpdated
        }
        CanaryDecision::Set(state) => {
            let record = ModVariantRecord {
                tag: tag.to_string(),
                logical_id: artifact.logical_id.clone(),
                variant: kind,
                version: artifact.logical_version.clone(),
                content_hash: artifact.content_hash.clone(),
                filename: artifact.full_name.clone(),
                storage_url,
                inserted_at: now,
                canary: state.into_stored(),
            };
            store.upsert(&record).await?;
            info!(
                "{} {} -> {} {:?} ({})",
                tag, kind, record.logical_id, record.version, record.content_hash
            );
            if existing.is_some() {
                CommitOutcome::Replaced
            } else {
                CommitOutcome::Inserted
            }
        }
    };

    Ok(VariantCommit {
        variant: kind,
        logical_id: artifact.logical_id.clone(),
        content_hash: artifact.content_hash.clone(),
        outcome,
    })
}
