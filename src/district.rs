//! District type secondary dataset fetcher.
//!
//! Independent of the download portal: each school year has its own
//! district type search page, which links the classification workbook as a
//! spreadsheet attachment. The fetcher fails soft; any miss along the way
//! (page missing, no link, unreadable workbook) yields `None` so a batch is
//! never aborted over the secondary dataset.

use std::io::Cursor;

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx, XlsxError};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::table::Table;

/// Site the district type search pages live on.
pub const DISTRICT_TYPE_BASE_URL: &str = "https://tea.texas.gov";

/// Sheet index the classification data occupies in the workbook.
const DISTRICT_TYPE_SHEET: usize = 2;

/// Canonical on-disk name for a year's district type file.
#[must_use]
pub fn district_type_file_name(year: i32) -> String {
    format!("district_type{year}.csv")
}

/// Formats a school-year token from its ending year: 2024 becomes `2023-24`.
#[must_use]
pub fn school_year_token(year: i32) -> String {
    format!("{}-{:02}", year - 1, year.rem_euclid(100))
}

/// Errors that can interrupt a district type fetch.
///
/// All of them downgrade to a logged `None` at the [`DistrictTypeSource`]
/// surface; the enum exists so the log line can say what actually failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A URL could not be constructed from its parts.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The URL string that failed to parse.
        url: String,
    },

    /// Transport-level failure against the search page or the workbook.
    #[error("network error fetching {url}: {source}")]
    Http {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The workbook could not be parsed as a spreadsheet.
    #[error("unreadable workbook at {url}: {source}")]
    Workbook {
        /// The workbook URL.
        url: String,
        /// The underlying spreadsheet error.
        #[source]
        source: XlsxError,
    },

    /// The workbook has no sheet at the expected index.
    #[error("workbook at {url} has no sheet {index}")]
    MissingSheet {
        /// The workbook URL.
        url: String,
        /// The missing sheet index.
        index: usize,
    },
}

/// Yields the per-year district classification table, when published.
#[async_trait]
pub trait DistrictTypeSource: Send + Sync {
    /// Returns the year's district type table, or `None` when it cannot be
    /// retrieved.
    async fn fetch(&self, year: i32) -> Option<Table>;
}

/// Live fetcher: scans the district type search page for the first
/// spreadsheet link in document order and reads its third sheet.
pub struct DistrictTypeFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl DistrictTypeFetcher {
    /// Creates a fetcher against the production site.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        let base_url = match Url::parse(DISTRICT_TYPE_BASE_URL) {
            Ok(url) => url,
            // The constant is a literal absolute URL.
            Err(_) => unreachable!("base URL constant must parse"),
        };
        Self { client, base_url }
    }

    /// Creates a fetcher against an alternate site root.
    #[must_use]
    pub fn with_base_url(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// The fallible fetch pipeline behind [`DistrictTypeSource::fetch`].
    ///
    /// `Ok(None)` means the year has no published data (missing page or no
    /// spreadsheet link); `Err` means something broke along the way.
    pub async fn try_fetch(&self, year: i32) -> Result<Option<Table>, FetchError> {
        let token = school_year_token(year);
        let path =
            format!("/reports-and-data/school-data/district-type-data-search/district-type-{token}");
        let page_url = self
            .base_url
            .join(&path)
            .map_err(|_| FetchError::InvalidUrl { url: path.clone() })?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: page_url.to_string(),
                source: e,
            })?;
        if response.status().as_u16() != 200 {
            warn!(
                url = %page_url,
                status = response.status().as_u16(),
                "district type page unavailable"
            );
            return Ok(None);
        }
        let body = response.text().await.map_err(|e| FetchError::Http {
            url: page_url.to_string(),
            source: e,
        })?;

        let Some(workbook_url) = find_spreadsheet_link(&body, &page_url) else {
            warn!(url = %page_url, "no spreadsheet link found");
            return Ok(None);
        };
        debug!(url = %workbook_url, "found spreadsheet link");

        let bytes = self
            .client
            .get(workbook_url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| FetchError::Http {
                url: workbook_url.to_string(),
                source: e,
            })?
            .bytes()
            .await
            .map_err(|e| FetchError::Http {
                url: workbook_url.to_string(),
                source: e,
            })?;

        let table = read_sheet(&bytes, DISTRICT_TYPE_SHEET, workbook_url.as_str())?;
        Ok(Some(table))
    }
}

#[async_trait]
impl DistrictTypeSource for DistrictTypeFetcher {
    async fn fetch(&self, year: i32) -> Option<Table> {
        match self.try_fetch(year).await {
            Ok(found) => found,
            Err(error) => {
                warn!(year, %error, "district type fetch failed");
                None
            }
        }
    }
}

/// Finds the first anchor in document order whose href names a spreadsheet,
/// resolved against the page URL.
fn find_spreadsheet_link(html: &str, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("a[href]").ok()?;
    let document = Html::parse_document(html);
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.ends_with(".xlsx")
            && let Ok(resolved) = page_url.join(href)
        {
            return Some(resolved);
        }
    }
    None
}

/// Reads one sheet of an in-memory workbook into a [`Table`], first row as
/// headers.
fn read_sheet(bytes: &[u8], index: usize, url: &str) -> Result<Table, FetchError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes.to_vec())).map_err(|e| FetchError::Workbook {
            url: url.to_string(),
            source: e,
        })?;
    let range = workbook
        .worksheet_range_at(index)
        .ok_or(FetchError::MissingSheet {
            url: url.to_string(),
            index,
        })?
        .map_err(|e| FetchError::Workbook {
            url: url.to_string(),
            source: e,
        })?;

    let mut rows = range.rows().map(|row| {
        row.iter()
            .map(|cell| match cell {
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<String>>()
    });
    let headers = rows.next().unwrap_or_default();
    Ok(Table::new(headers, rows.collect()))
}
