//! HTTP form-driving implementation of [`PortalSession`].
//!
//! The portal's download options page is a plain HTML form: radio groups for
//! level and dataset, a submit button that answers with a file attachment.
//! This session fetches the page, validates that selected controls actually
//! exist in the document, submits the accumulated selections on click, and
//! streams the attachment into the download directory. While a file is being
//! written it carries a `.crdownload` marker name, so the completion watcher
//! observes the same in-progress semantics a real browser produces.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use scraper::{Html, Selector};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use url::Url;

use crate::download::IN_PROGRESS_EXT;

use super::{BrowserError, PortalSession, SessionProvider};

/// Opens [`FormSession`]s sharing one cookie-carrying HTTP client.
pub struct FormSessionProvider {
    client: Client,
}

impl FormSessionProvider {
    /// Builds the provider and its HTTP client.
    pub fn new() -> Result<Self, BrowserError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(std::time::Duration::from_secs(10))
            .read_timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(BrowserError::client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SessionProvider for FormSessionProvider {
    async fn open(&self, download_dir: &Path) -> Result<Box<dyn PortalSession>, BrowserError> {
        Ok(Box::new(FormSession::new(
            self.client.clone(),
            download_dir,
        )))
    }
}

/// A portal session backed by direct HTTP form submission.
pub struct FormSession {
    client: Client,
    download_dir: PathBuf,
    page_url: Option<Url>,
    page_html: String,
    selections: Vec<(String, String)>,
}

impl FormSession {
    /// Creates a session whose downloads land in `download_dir`.
    #[must_use]
    pub fn new(client: Client, download_dir: &Path) -> Self {
        Self {
            client,
            download_dir: download_dir.to_path_buf(),
            page_url: None,
            page_html: String::new(),
            selections: Vec::new(),
        }
    }

    /// The URL the submit control posts to: the form's `action` attribute
    /// resolved against the page URL, or the page URL itself when the form
    /// declares none.
    fn submit_url(&self) -> Result<Url, BrowserError> {
        let page_url = self.page_url.as_ref().ok_or(BrowserError::NoPage)?;
        match form_action(&self.page_html) {
            Some(action) => page_url
                .join(&action)
                .map_err(|_| BrowserError::control_not_found(format!("form action {action:?}"))),
            None => Ok(page_url.clone()),
        }
    }

    async fn save_attachment(&self, response: reqwest::Response) -> Result<PathBuf, BrowserError> {
        let url = response.url().clone();
        let name = attachment_filename(&response);
        let final_path = self.download_dir.join(&name);
        let part_path = self.download_dir.join(format!("{name}.{IN_PROGRESS_EXT}"));

        if let Err(error) = stream_to_part(response, &url, &part_path).await {
            // Do not leave a stale marker behind on a failed transfer.
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(error);
        }

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| BrowserError::save(&final_path, e))?;
        debug!(path = %final_path.display(), "download saved");
        Ok(final_path)
    }
}

#[async_trait]
impl PortalSession for FormSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrowserError::navigation(url, e))?;
        // An error status still carries a page body; the caller inspects the
        // text for not-found content rather than relying on the status.
        self.page_url = Some(response.url().clone());
        self.page_html = response
            .text()
            .await
            .map_err(|e| BrowserError::navigation(url, e))?;
        self.selections.clear();
        debug!(url, bytes = self.page_html.len(), "page loaded");
        Ok(())
    }

    async fn select_radio(&mut self, group: &str, value: &str) -> Result<(), BrowserError> {
        if self.page_url.is_none() {
            return Err(BrowserError::NoPage);
        }
        if !has_radio(&self.page_html, group, value) {
            return Err(BrowserError::control_not_found(format!(
                "radio {group}={value}"
            )));
        }
        self.selections.retain(|(name, _)| name != group);
        self.selections.push((group.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&mut self, control: &str) -> Result<(), BrowserError> {
        if !has_submit(&self.page_html, control) {
            return Err(BrowserError::control_not_found(format!(
                "submit {control}"
            )));
        }
        let submit_url = self.submit_url()?;
        let response = self
            .client
            .post(submit_url.clone())
            .form(&self.selections)
            .send()
            .await
            .map_err(|e| BrowserError::submit(submit_url.as_str(), e))?;
        if !response.status().is_success() {
            return Err(BrowserError::SubmitStatus {
                url: submit_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        self.save_attachment(response).await?;
        Ok(())
    }

    fn page_text(&self) -> &str {
        &self.page_html
    }

    async fn close(self: Box<Self>) {
        // Nothing external to tear down: dropping the session releases its
        // connections. Kept explicit so callers release on every exit path.
        debug!("portal session closed");
    }
}

/// Streams the response body into the marker-named part file.
async fn stream_to_part(
    response: reqwest::Response,
    url: &Url,
    part_path: &Path,
) -> Result<(), BrowserError> {
    let file = File::create(part_path)
        .await
        .map_err(|e| BrowserError::save(part_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BrowserError::submit(url.as_str(), e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| BrowserError::save(part_path, e))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| BrowserError::save(part_path, e))
}

fn has_radio(html: &str, group: &str, value: &str) -> bool {
    has_control(
        html,
        &format!(r#"input[type="radio"][name="{group}"][value="{value}"]"#),
    )
}

fn has_submit(html: &str, control: &str) -> bool {
    has_control(html, &format!(r#"input[type="submit"][value="{control}"]"#))
}

fn has_control(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

fn form_action(html: &str) -> Option<String> {
    let selector = Selector::parse("form").ok()?;
    Html::parse_document(html)
        .select(&selector)
        .next()
        .and_then(|form| form.value().attr("action"))
        .map(str::to_string)
}

/// Names the attachment: Content-Disposition first, then the last URL path
/// segment, then a generic fallback.
fn attachment_filename(response: &reqwest::Response) -> String {
    let raw = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition)
        .or_else(|| filename_from_url(response.url()));

    // Keep only the final path component so a hostile header cannot place
    // the file outside the download directory.
    raw.as_deref()
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map_or_else(
            || {
                warn!(url = %response.url(), "attachment has no usable filename");
                "download.bin".to_string()
            },
            str::to_string,
        )
}

/// Extracts a filename from a Content-Disposition header value.
///
/// Prefers the RFC 5987 `filename*=` form, then plain `filename=` with or
/// without quotes.
fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <form action="cgi/sas/broker" method="post">
          <input type="radio" name="sumlev" value="C">
          <input type="radio" name="sumlev" value="D">
          <input type="radio" name="setpick" value="GRAD">
          <input type="submit" value="Continue">
        </form>
        </body></html>"#;

    #[test]
    fn has_radio_matches_group_and_value() {
        assert!(has_radio(PAGE, "sumlev", "D"));
        assert!(has_radio(PAGE, "setpick", "GRAD"));
        assert!(!has_radio(PAGE, "sumlev", "X"));
        assert!(!has_radio(PAGE, "other", "D"));
    }

    #[test]
    fn has_submit_matches_button_value() {
        assert!(has_submit(PAGE, "Continue"));
        assert!(!has_submit(PAGE, "Reset"));
    }

    #[test]
    fn form_action_reads_first_form() {
        assert_eq!(form_action(PAGE).as_deref(), Some("cgi/sas/broker"));
        assert_eq!(form_action("<html><body>no form</body></html>"), None);
    }

    #[test]
    fn content_disposition_plain_filename() {
        assert_eq!(
            parse_content_disposition("attachment; filename=DISTGRAD.csv"),
            Some("DISTGRAD.csv".to_string())
        );
    }

    #[test]
    fn content_disposition_quoted_filename() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="DREF.dat""#),
            Some("DREF.dat".to_string())
        );
    }

    #[test]
    fn content_disposition_rfc5987_filename() {
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''DIST%20GRAD.csv"),
            Some("DIST GRAD.csv".to_string())
        );
    }

    #[test]
    fn content_disposition_without_filename_is_none() {
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn url_fallback_uses_last_segment() {
        let url = Url::parse("https://example.com/files/CAMPPROF.csv").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("CAMPPROF.csv"));
    }

    #[test]
    fn content_disposition_path_components_are_stripped() {
        assert_eq!(
            parse_content_disposition("attachment; filename=../../etc/DISTGRAD.csv")
                .as_deref()
                .and_then(|name| name.rsplit(['/', '\\']).next()),
            Some("DISTGRAD.csv")
        );
    }
}
