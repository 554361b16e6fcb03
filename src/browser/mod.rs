//! Portal session capability.
//!
//! The orchestrator drives the download portal through the narrow
//! [`PortalSession`] surface: load a page, pick radio options, click a named
//! control, read the page text. Implementations own whatever transport
//! actually talks to the page; [`FormSession`](form::FormSession) drives the
//! portal's plain HTML form over HTTP.
//!
//! Sessions are a scoped resource: the orchestrator opens one per year via
//! [`SessionProvider`] and closes it on every exit path.

mod form;

pub use form::{FormSession, FormSessionProvider};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while driving the portal page.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Navigation failed at the transport level.
    #[error("failed to load {url}: {source}")]
    Navigation {
        /// The URL that failed to load.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// No page has been loaded yet, so there is nothing to interact with.
    #[error("no page loaded; navigate first")]
    NoPage,

    /// The current page does not contain the requested control.
    #[error("control not found: {control}")]
    ControlNotFound {
        /// A description of the missing control.
        control: String,
    },

    /// The form submission failed at the transport level.
    #[error("network error submitting form to {url}: {source}")]
    Submit {
        /// The submission URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The form submission came back with a non-success status.
    #[error("HTTP {status} submitting form to {url}")]
    SubmitStatus {
        /// The submission URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The triggered download could not be written to disk.
    #[error("failed to save download to {path}: {source}")]
    Save {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl BrowserError {
    /// Creates a client construction error.
    pub fn client(source: reqwest::Error) -> Self {
        Self::Client { source }
    }

    /// Creates a navigation error.
    pub fn navigation(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Navigation {
            url: url.into(),
            source,
        }
    }

    /// Creates a control-not-found error.
    pub fn control_not_found(control: impl Into<String>) -> Self {
        Self::ControlNotFound {
            control: control.into(),
        }
    }

    /// Creates a submission transport error.
    pub fn submit(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Submit {
            url: url.into(),
            source,
        }
    }

    /// Creates a save error.
    pub fn save(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Save {
            path: path.into(),
            source,
        }
    }
}

/// One stateful portal page session.
///
/// # Object Safety
///
/// Uses `async_trait` so the orchestrator can hold `Box<dyn PortalSession>`;
/// Rust 2024 native async traits are not object-safe.
#[async_trait]
pub trait PortalSession: Send {
    /// Loads `url`, replacing any current page.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Selects the radio input named `group` with the given `value`.
    async fn select_radio(&mut self, group: &str, value: &str) -> Result<(), BrowserError>;

    /// Clicks the named submit control, carrying out any download it
    /// triggers before returning.
    async fn click(&mut self, control: &str) -> Result<(), BrowserError>;

    /// The current page's text content. Empty before the first navigation.
    fn page_text(&self) -> &str;

    /// Releases the session's resources.
    async fn close(self: Box<Self>);
}

/// Opens one [`PortalSession`] per year, with downloads landing in
/// `download_dir`.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Opens a fresh session whose downloads are written to `download_dir`.
    async fn open(&self, download_dir: &Path) -> Result<Box<dyn PortalSession>, BrowserError>;
}
