mod asset_name;
mod resolver;

pub use asset_name::CandidateAsset;
pub use resolver::ResolvedAssets;
