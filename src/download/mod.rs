//! Download-side file logic.
//!
//! Everything here works against the local filesystem: the naming convention
//! shared by all downloaded report files, the presence oracle that makes
//! re-runs idempotent, the completion watcher that detects when asynchronous
//! downloads have settled, and the normalizer that renames and converts the
//! results.

mod naming;
mod normalize;
mod watcher;

pub use naming::{
    already_present, canonical_file_name, download_file_name, era_extension, presence_candidates,
};
pub use normalize::{convert_dat_files, rename_canonical};
pub use watcher::wait_for_completion;

/// First school year the portal publishes in the tabular interchange format.
/// Earlier years use the legacy fixed-format extension.
pub const ERA_CUTOFF_YEAR: i32 = 2021;

/// Legacy fixed-format extension used below the cutoff year.
pub const LEGACY_EXT: &str = "dat";

/// Tabular interchange extension used at and after the cutoff year.
pub const CSV_EXT: &str = "csv";

/// Marker extension carried by files that are still being written.
pub const IN_PROGRESS_EXT: &str = "crdownload";

/// The variable whose files carry the level code instead of the prefix.
pub const REF_VARIABLE: &str = "REF";

/// Seconds between filesystem polls while waiting for downloads.
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Default overall watcher deadline in seconds.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 200;
