//! The per-year download state machine.
//!
//! For each requested year the orchestrator creates the working directory,
//! opens a portal session, drives the selection protocol variable by
//! variable, waits for the resulting downloads to settle, renames them to
//! canonical names, fetches the district type dataset where applicable, and
//! converts legacy files. Failures are scoped: a broken variable moves to
//! the next variable, a broken year moves to the next year, and only an
//! invalid request aborts the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{PortalSession, SessionProvider};
use crate::district::{DistrictTypeSource, district_type_file_name};
use crate::download::{
    DEFAULT_WATCH_TIMEOUT_SECS, already_present, convert_dat_files, rename_canonical,
    wait_for_completion,
};
use crate::progress::ProgressSink;
use crate::request::{Level, Request, RequestError};

/// Production portal root for the per-year download options pages.
pub const DEFAULT_PORTAL_BASE: &str = "https://rptsvr1.tea.texas.gov/perfreport/tapr";

/// Pause between selecting a dataset radio and clicking Continue, giving
/// the stateful page time to settle.
const SETTLE_PAUSE: Duration = Duration::from_secs(1);

/// Resolution of one `(year, variable)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A matching file already existed; the portal was never touched for
    /// this variable.
    AlreadyPresent,
    /// The portal accepted the selection and the file settled on disk.
    Downloaded,
    /// The portal has no selection control for this variable this year.
    UnavailableOnSite,
    /// The download never settled before the watcher deadline.
    TimedOut,
}

/// What happened to one requested year.
#[derive(Debug, Clone)]
pub struct YearSummary {
    /// The school year.
    pub year: i32,
    /// True when the year was skipped before any variable was attempted
    /// (page missing or level control absent).
    pub skipped: bool,
    /// Per-variable outcomes, in request order. Empty for skipped years.
    pub outcomes: Vec<(String, DownloadOutcome)>,
}

impl YearSummary {
    fn skipped(year: i32) -> Self {
        Self {
            year,
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    /// Counts outcomes matching `outcome`.
    #[must_use]
    pub fn count(&self, outcome: DownloadOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Full batch result: one summary per requested year, in request order.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Per-year summaries.
    pub years: Vec<YearSummary>,
}

impl BatchSummary {
    /// Counts outcomes matching `outcome` across all years.
    #[must_use]
    pub fn count(&self, outcome: DownloadOutcome) -> usize {
        self.years.iter().map(|year| year.count(outcome)).sum()
    }

    /// Counts years that were skipped outright.
    #[must_use]
    pub fn skipped_years(&self) -> usize {
        self.years.iter().filter(|year| year.skipped).count()
    }
}

/// Tuning knobs for a batch run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root URL of the download portal.
    pub portal_base: String,
    /// Overall per-year deadline for downloads to settle.
    pub watch_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            portal_base: DEFAULT_PORTAL_BASE.to_string(),
            watch_timeout: Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
        }
    }
}

/// Outcome of driving the portal for one year, before post-download steps.
enum PortalDrive {
    /// The year was abandoned before any variable was attempted.
    Skipped,
    /// The selection loop ran to completion.
    Completed(Vec<(String, DownloadOutcome)>),
}

/// Coordinates the presence oracle, portal sessions, completion watcher,
/// normalizer, and district type fetcher across a batch request.
pub struct Orchestrator {
    provider: Box<dyn SessionProvider>,
    district_types: Box<dyn DistrictTypeSource>,
    progress: Arc<dyn ProgressSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator with default configuration.
    #[must_use]
    pub fn new(
        provider: Box<dyn SessionProvider>,
        district_types: Box<dyn DistrictTypeSource>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::with_config(
            provider,
            district_types,
            progress,
            OrchestratorConfig::default(),
        )
    }

    /// Creates an orchestrator with explicit configuration.
    #[must_use]
    pub fn with_config(
        provider: Box<dyn SessionProvider>,
        district_types: Box<dyn DistrictTypeSource>,
        progress: Arc<dyn ProgressSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            district_types,
            progress,
            config,
        }
    }

    /// Runs the batch: years outer, variables inner, strictly sequential.
    ///
    /// Only request-boundary failures abort; every other failure is
    /// downgraded to a variable- or year-scoped skip with a progress line.
    pub async fn run(&self, request: &Request) -> Result<BatchSummary, RequestError> {
        // The directory may have disappeared between request construction
        // and the run; re-check before touching the portal.
        if !request.directory.is_dir() {
            return Err(RequestError::invalid_directory(request.directory.clone()));
        }
        self.progress
            .emit(&format!("Processing directory: {}", request.directory.display()));
        info!(
            directory = %request.directory.display(),
            years = request.years.len(),
            variables = request.variables.len(),
            level = %request.level,
            "starting batch"
        );

        let mut summary = BatchSummary::default();
        for &year in &request.years {
            summary.years.push(self.process_year(request, year).await);
        }

        self.progress.emit("All Data Downloaded!");
        Ok(summary)
    }

    /// Processes a single year end to end. Never fails the batch: every
    /// error path degrades to a skip recorded in the summary.
    async fn process_year(&self, request: &Request, year: i32) -> YearSummary {
        let year_dir = request.directory.join(format!("raw_data{year}"));
        if let Err(error) = std::fs::create_dir_all(&year_dir) {
            warn!(year, %error, "could not create year directory");
            self.progress
                .emit(&format!("Failed to access {year}. Error: {error}"));
            return YearSummary::skipped(year);
        }

        let mut session = match self.provider.open(&year_dir).await {
            Ok(session) => session,
            Err(error) => {
                warn!(year, %error, "could not open portal session");
                self.progress
                    .emit(&format!("Failed to access {year}. Error: {error}"));
                return YearSummary::skipped(year);
            }
        };

        // The session stays open through the watch-and-rename phase: the
        // downloads it triggered are still landing. It is closed before any
        // post-download step, on every exit path.
        let drive = self
            .drive_portal(session.as_mut(), request, year, &year_dir)
            .await;
        session.close().await;

        let outcomes = match drive {
            PortalDrive::Skipped => return YearSummary::skipped(year),
            PortalDrive::Completed(outcomes) => outcomes,
        };

        if request.level == Level::District && request.include_secondary {
            self.fetch_district_types(year, &year_dir).await;
        }

        // Legacy conversion is the year's unconditional final step, even
        // when downloads timed out or the secondary data was skipped.
        convert_dat_files(&year_dir, self.progress.as_ref());

        YearSummary {
            year,
            skipped: false,
            outcomes,
        }
    }

    /// Drives the selection protocol and the completion watch for one year.
    async fn drive_portal(
        &self,
        session: &mut dyn PortalSession,
        request: &Request,
        year: i32,
        year_dir: &Path,
    ) -> PortalDrive {
        let url = format!("{}/{year}/download/DownloadData.html", self.config.portal_base);
        if let Err(error) = session.navigate(&url).await {
            warn!(year, %error, "portal navigation failed");
            self.progress
                .emit(&format!("Failed to access {year}. Error: {error}"));
            return PortalDrive::Skipped;
        }

        let text = session.page_text();
        if text.contains("Page Not Found") || text.contains("404") {
            self.progress
                .emit(&format!("Year {year} does not exist. Skipping..."));
            return PortalDrive::Skipped;
        }

        if let Err(error) = session.select_radio("sumlev", request.level.code()).await {
            warn!(year, %error, "level control missing");
            self.progress
                .emit(&format!("Failed to access {year}. Error: {error}"));
            return PortalDrive::Skipped;
        }

        self.progress.emit(&format!(
            "Downloading {} Level TAPR Data for {year}...",
            request.level
        ));

        let mut outcomes = Vec::with_capacity(request.variables.len());
        for variable in &request.variables {
            let outcome = self
                .resolve_variable(session, request, year, year_dir, variable)
                .await;
            outcomes.push((variable.clone(), outcome));
        }

        // Only variables the portal actually accepted need watching;
        // already-present and unavailable ones have nothing in flight.
        let watched: Vec<String> = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == DownloadOutcome::Downloaded)
            .map(|(variable, _)| variable.clone())
            .collect();

        let settled = wait_for_completion(
            &watched,
            year,
            request.level,
            year_dir,
            self.config.watch_timeout,
            self.progress.as_ref(),
        )
        .await;

        if settled {
            for variable in &watched {
                match rename_canonical(year_dir, year, variable, request.level) {
                    Ok(true) => {}
                    Ok(false) => debug!(year, variable = %variable, "no downloaded file to rename"),
                    Err(error) => warn!(year, variable = %variable, %error, "rename failed"),
                }
            }
        } else {
            self.progress.emit(&format!(
                "Timed out waiting for {year} downloads. Skipping renames..."
            ));
            for (_, outcome) in &mut outcomes {
                if *outcome == DownloadOutcome::Downloaded {
                    *outcome = DownloadOutcome::TimedOut;
                }
            }
        }

        PortalDrive::Completed(outcomes)
    }

    /// Resolves one variable: oracle first, portal second.
    async fn resolve_variable(
        &self,
        session: &mut dyn PortalSession,
        request: &Request,
        year: i32,
        year_dir: &Path,
        variable: &str,
    ) -> DownloadOutcome {
        let prefix = request.level.prefix();
        self.progress
            .emit(&format!("Checking for {prefix}{variable} data..."));

        if already_present(year_dir, request.level, variable, year) {
            self.progress.emit(&format!("{variable}_{year} already exists"));
            return DownloadOutcome::AlreadyPresent;
        }

        // Single attempt, fail fast to the next variable: a missing control
        // means the portal does not publish this variable for this year.
        if let Err(error) = session.select_radio("setpick", variable).await {
            debug!(year, variable, %error, "dataset control missing");
            self.progress.emit(&format!("{variable} not found for {year}"));
            return DownloadOutcome::UnavailableOnSite;
        }

        tokio::time::sleep(SETTLE_PAUSE).await;

        if let Err(error) = session.click("Continue").await {
            warn!(year, variable, %error, "download submission failed");
            self.progress.emit(&format!("{variable} not found for {year}"));
            return DownloadOutcome::UnavailableOnSite;
        }

        let token = if variable == crate::download::REF_VARIABLE {
            request.level.code()
        } else {
            prefix
        };
        self.progress
            .emit(&format!("Downloaded {token}{variable} for {year}"));
        DownloadOutcome::Downloaded
    }

    /// Fetches and persists the district type dataset for one year.
    async fn fetch_district_types(&self, year: i32, year_dir: &Path) {
        self.progress
            .emit(&format!("Downloading District Type Data for {year}..."));

        let target: PathBuf = year_dir.join(district_type_file_name(year));
        if target.is_file() {
            self.progress
                .emit(&format!("District Type Data for {year} already exists"));
            return;
        }

        let Some(table) = self.district_types.fetch(year).await else {
            self.progress.emit(&format!(
                "Failed to retrieve District Type Data for {year}. Skipping..."
            ));
            return;
        };

        match table.write_csv(&target) {
            Ok(()) => {
                self.progress
                    .emit(&format!("Downloaded District Type Data for {year}"));
            }
            Err(error) => {
                warn!(year, %error, "could not write district type file");
                self.progress.emit(&format!(
                    "Failed to retrieve District Type Data for {year}. Skipping..."
                ));
            }
        }
    }
}
