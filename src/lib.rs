//! TAPR Scraper Core Library
//!
//! This library automates retrieval of Texas Academic Performance Report
//! (TAPR) datasets from the TEA download portal for a chosen administrative
//! level, a set of school years, and a set of variable codes. Downloads are
//! driven through a form-submission session, detected on disk by a polling
//! watcher, renamed into a stable `{PREFIX}{VAR}_{year}.{ext}` convention,
//! and legacy `.dat` files are converted to `.csv`.
//!
//! # Architecture
//!
//! - [`request`] - Validated batch request and administrative level
//! - [`browser`] - Portal session capability and its HTTP form implementation
//! - [`download`] - Naming convention, presence oracle, completion watcher,
//!   file normalizer
//! - [`district`] - Secondary district type dataset fetcher
//! - [`orchestrator`] - The per-year download state machine

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod district;
pub mod download;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod table;

// Re-export commonly used types
pub use browser::{BrowserError, FormSessionProvider, PortalSession, SessionProvider};
pub use district::{DistrictTypeFetcher, DistrictTypeSource, district_type_file_name};
pub use download::{
    DEFAULT_WATCH_TIMEOUT_SECS, ERA_CUTOFF_YEAR, already_present, canonical_file_name,
    convert_dat_files, download_file_name, era_extension, rename_canonical, wait_for_completion,
};
pub use orchestrator::{
    BatchSummary, DownloadOutcome, Orchestrator, OrchestratorConfig, YearSummary,
};
pub use progress::{MemorySink, NullSink, ProgressSink, StdoutSink};
pub use request::{Level, Request, RequestError};
pub use table::Table;
