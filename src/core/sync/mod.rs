mod commit;
mod reconciler;
mod scheduler;
mod upload;

pub use commit::{commit_variant, plan_variants, CommitOutcome, VariantCommit};
pub use reconciler::{ModOutcome, ModStatus, PassReport, PruneFailure, Reconciler};
pub use scheduler::spawn_scheduler;
pub use upload::{authorize_upload, UploadSubmission};
