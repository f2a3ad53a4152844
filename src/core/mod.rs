// ─── Mods Catalog Core ───
// Keeps a catalog of game mod artifacts in sync with their upstream releases.
//
// Architecture:
//   core/
//     config/      Env settings + catalog entries (JSON file or built-in)
//     version/     Dotted version comparison
//     assets/      Release asset name parsing + per-kind resolution
//     sources/     GitHub / GitLab release feeds, canary marker
//     downloader/  Fetch, hash, manifest read, content-addressed blobs
//     canary/      Rollout state machine
//     catalog/     SQLite record store + memoized public views
//     sync/        Reconciliation pass, uploads, scheduler
//     state/       Shared application state

pub mod assets;
pub mod canary;
pub mod catalog;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod sources;
pub mod state;
pub mod sync;
pub mod version;
