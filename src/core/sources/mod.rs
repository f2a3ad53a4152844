mod canary_marker;
pub mod github;
pub mod gitlab;
pub mod strategy;

pub use canary_marker::declared_canary_percent;
pub use strategy::{HttpReleaseFeed, ReleaseFeed, ReleaseStrategy, SourceDescriptor, SourceRelease, Strategy};
