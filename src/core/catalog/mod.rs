mod cache;
pub mod model;
pub mod store;

pub use cache::ViewCache;
pub use model::{
    AllVersions, Canary, LatestVersions, ModVariantRecord, PublishedMod, TagLatest, TagVersions,
    VariantKind, VariantRestriction,
};
pub use store::CatalogStore;
