use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use super::commit::{commit_variant, plan_variants, VariantCommit};
use super::reconciler::Reconciler;
use crate::core::assets::{CandidateAsset, ResolvedAssets};
use crate::core::catalog::VariantRestriction;
use crate::core::config::{CatalogEntry, EntrySource};
use crate::core::downloader::ResolvedArtifact;
use crate::core::error::{CatalogError, CatalogResult};

/// A manually submitted artifact for a placeholder tag.
#[derive(Debug, Clone)]
pub struct UploadSubmission {
    pub tag: String,
    pub file_name: String,
    pub bytes: Bytes,
    pub declared_canary_percent: Option<f64>,
    pub variant_restriction: Option<VariantRestriction>,
}

/// Check that `presented` may upload for `entry`.
///
/// Either the entry's own upload token or the admin token is accepted.
pub fn authorize_upload(
    entry: &CatalogEntry,
    presented: Option<&str>,
    admin_token: Option<&str>,
) -> CatalogResult<()> {
    let Some(presented) = presented.filter(|t| !t.is_empty()) else {
        return Err(CatalogError::Unauthorized(entry.tag.clone()));
    };

    let accepted = [entry.upload_token.as_deref(), admin_token]
        .into_iter()
        .flatten()
        .any(|token| token == presented);

    if accepted {
        Ok(())
    } else {
        Err(CatalogError::Unauthorized(entry.tag.clone()))
    }
}

impl UploadSubmission {
    /// Everything that can be rejected before touching any state.
    fn validate(
        &self,
        entry: &CatalogEntry,
    ) -> CatalogResult<(CandidateAsset, Option<VariantRestriction>)> {
        if !matches!(entry.source, EntrySource::Manual) {
            return Err(CatalogError::Validation(format!(
                "tag {} is synced from upstream and does not accept uploads",
                entry.tag
            )));
        }

        if self.bytes.is_empty() {
            return Err(CatalogError::Validation("missing file".into()));
        }

        if self.file_name.contains(['/', '\\']) || self.file_name.contains("..") {
            return Err(CatalogError::Validation(format!(
                "{:?} is not a plain file name",
                self.file_name
            )));
        }

        let candidate = CandidateAsset::parse(&self.file_name, "").ok_or_else(|| {
            CatalogError::Validation(format!(
                "{:?} is not a .mtmod or .wotmod file",
                self.file_name
            ))
        })?;

        let restriction = match (entry.variant_restriction, self.variant_restriction) {
            (Some(configured), Some(requested)) if configured != requested => {
                return Err(CatalogError::Validation(format!(
                    "tag {} only accepts {}",
                    entry.tag,
                    configured.kind()
                )));
            }
            (configured, requested) => requested.or(configured),
        };

        if let Some(percent) = self.declared_canary_percent {
            if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                return Err(CatalogError::Validation(format!(
                    "canary percent {percent} outside 0..=100"
                )));
            }
        }

        Ok((candidate, restriction))
    }
}

impl Reconciler {
    /// Accept a manual upload through the same commit path as a pass.
    ///
    /// Waits for any running pass to finish so both never write at once.
    pub async fn submit_upload(
        &self,
        submission: UploadSubmission,
    ) -> CatalogResult<Vec<VariantCommit>> {
        let entry = self
            .config
            .get(&submission.tag)
            .ok_or_else(|| CatalogError::UnknownTag(submission.tag.clone()))?;
        let (candidate, restriction) = submission.validate(entry)?;

        let artifact = ResolvedArtifact::inspect(&candidate, submission.bytes.clone());
        let resolved = ResolvedAssets::resolve([candidate])?;
        let plan = plan_variants(&resolved, restriction);

        let _guard = self.write_guard.lock().await;
        let now = Utc::now();
        let mut commits = Vec::with_capacity(plan.len());
        for (kind, _) in plan {
            commits.push(
                commit_variant(
                    &self.store,
                    &self.content,
                    &entry.tag,
                    kind,
                    &artifact,
                    submission.declared_canary_percent,
                    now,
                )
                .await?,
            );
        }

        info!(
            "Upload accepted for {}: {} ({})",
            entry.tag, artifact.full_name, artifact.content_hash
        );
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::VariantKind;

    fn entry(source: EntrySource, token: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            tag: "wotstat.widgets".into(),
            variant_restriction: None,
            upload_token: token.map(String::from),
            source,
        }
    }

    fn submission(file_name: &str, bytes: &'static [u8]) -> UploadSubmission {
        UploadSubmission {
            tag: "wotstat.widgets".into(),
            file_name: file_name.into(),
            bytes: Bytes::from_static(bytes),
            declared_canary_percent: None,
            variant_restriction: None,
        }
    }

    #[test]
    fn entry_token_or_admin_token_authorizes() {
        let e = entry(EntrySource::Manual, Some("tag-token"));
        assert!(authorize_upload(&e, Some("tag-token"), Some("admin")).is_ok());
        assert!(authorize_upload(&e, Some("admin"), Some("admin")).is_ok());
        assert!(matches!(
            authorize_upload(&e, Some("guess"), Some("admin")),
            Err(CatalogError::Unauthorized(_))
        ));
        assert!(authorize_upload(&e, None, Some("admin")).is_err());

        let no_tokens = entry(EntrySource::Manual, None);
        assert!(authorize_upload(&no_tokens, Some(""), None).is_err());
    }

    #[test]
    fn rejects_empty_and_unrecognized_files() {
        let e = entry(EntrySource::Manual, None);
        assert!(matches!(
            submission("w_1.0.wotmod", b"").validate(&e),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            submission("w_1.0.zip", b"zip").validate(&e),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn path_like_file_names_are_rejected() {
        let e = entry(EntrySource::Manual, None);
        for name in [
            "../../../../evil_1.0.wotmod",
            "nested/w_1.0.wotmod",
            "..\\w_1.0.mtmod",
            "w..x_1.0.wotmod",
        ] {
            assert!(
                matches!(submission(name, b"zip").validate(&e), Err(CatalogError::Validation(_))),
                "{name} accepted"
            );
        }
    }

    #[test]
    fn restriction_must_match_configuration() {
        let mut e = entry(EntrySource::Manual, None);
        e.variant_restriction = Some(VariantRestriction::WotOnly);

        let mut s = submission("w_1.0.wotmod", b"zip");
        s.variant_restriction = Some(VariantRestriction::MtOnly);
        assert!(matches!(s.validate(&e), Err(CatalogError::Validation(_))));

        s.variant_restriction = None;
        let (candidate, restriction) = s.validate(&e).unwrap();
        assert_eq!(candidate.kind, VariantKind::Wotmod);
        assert_eq!(restriction, Some(VariantRestriction::WotOnly));
    }

    #[test]
    fn rejects_out_of_range_canary() {
        let e = entry(EntrySource::Manual, None);
        let mut s = submission("w_1.0.wotmod", b"zip");
        s.declared_canary_percent = Some(120.0);
        assert!(s.validate(&e).is_err());
        s.declared_canary_percent = Some(f64::NAN);
        assert!(s.validate(&e).is_err());
    }

    #[test]
    fn sourced_tags_do_not_accept_uploads() {
        let e = entry(
            EntrySource::Remote(crate::core::sources::SourceDescriptor::Github {
                owner: "o".into(),
                repo: "r".into(),
            }),
            None,
        );
        assert!(submission("w_1.0.wotmod", b"zip").validate(&e).is_err());
    }
}
