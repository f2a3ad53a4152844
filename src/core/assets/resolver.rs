use std::cmp::Ordering;

use super::asset_name::CandidateAsset;
use crate::core::catalog::VariantKind;
use crate::core::error::CatalogResult;
use crate::core::version::compare_versions;

/// Highest-version candidate per variant kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub mtmod: Option<CandidateAsset>,
    pub wotmod: Option<CandidateAsset>,
}

impl ResolvedAssets {
    pub fn get(&self, kind: VariantKind) -> Option<&CandidateAsset> {
        match kind {
            VariantKind::Mtmod => self.mtmod.as_ref(),
            VariantKind::Wotmod => self.wotmod.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mtmod.is_none() && self.wotmod.is_none()
    }

    /// Pick the newest candidate of each kind.
    ///
    /// Equal versions resolve to the one seen last in input order.
    pub fn resolve<I>(candidates: I) -> CatalogResult<Self>
    where
        I: IntoIterator<Item = CandidateAsset>,
    {
        let mut resolved = Self::default();

        for candidate in candidates {
            let slot = match candidate.kind {
                VariantKind::Mtmod => &mut resolved.mtmod,
                VariantKind::Wotmod => &mut resolved.wotmod,
            };

            let replace = match slot {
                Some(best) => {
                    compare_versions(&candidate.version, &best.version)? != Ordering::Less
                }
                None => true,
            };
            if replace {
                *slot = Some(candidate);
            }
        }

        Ok(resolved)
    }
}
