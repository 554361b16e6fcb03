//! Polls the download directory until the expected files materialize.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::progress::ProgressSink;
use crate::request::Level;

use super::{IN_PROGRESS_EXT, POLL_INTERVAL_SECS, naming};

/// Waits until every expected download for `variables` has settled on disk,
/// or `timeout` elapses.
///
/// Expected names use the era-appropriate extension for `year` and the
/// as-downloaded (pre-rename) pattern. A file counts as settled when it
/// exists and no `.crdownload` marker sibling is present. The deadline is
/// measured on a monotonic clock from call start, independent of how many
/// polls fit inside it; the directory is re-read every 5 seconds.
///
/// This is a synchronous barrier for the calling flow: the caller awaits it
/// inline and must not proceed with the year's remaining steps until it
/// resolves. An empty `variables` set is vacuously complete and returns
/// `true` immediately, without touching the filesystem.
///
/// A one-time "waiting" line goes to `progress` on the first unsatisfied
/// poll; completion emits a success line.
pub async fn wait_for_completion(
    variables: &[String],
    year: i32,
    level: Level,
    directory: &Path,
    timeout: Duration,
    progress: &dyn ProgressSink,
) -> bool {
    if variables.is_empty() {
        return true;
    }

    let expected: Vec<String> = variables
        .iter()
        .map(|variable| naming::download_file_name(level, variable, naming::era_extension(year)))
        .collect();
    debug!(year, ?expected, "waiting for downloads");

    let start = Instant::now();
    let mut announced = false;
    loop {
        if all_settled(directory, &expected) {
            progress.emit(&format!("All downloads for {year} completed successfully."));
            return true;
        }
        if start.elapsed() >= timeout {
            debug!(year, ?expected, "download wait timed out");
            return false;
        }
        if !announced {
            progress.emit("Waiting for all files to download...");
            announced = true;
        }
        tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

fn all_settled(directory: &Path, expected: &[String]) -> bool {
    expected.iter().all(|name| {
        let marker = directory.join(format!("{name}.{IN_PROGRESS_EXT}"));
        directory.join(name).is_file() && !marker.exists()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::MemorySink;

    const TIMEOUT: Duration = Duration::from_secs(12);

    #[tokio::test(start_paused = true)]
    async fn empty_watch_set_is_vacuously_complete() {
        let sink = MemorySink::new();
        let start = Instant::now();
        // The directory does not even need to exist.
        let done = wait_for_completion(
            &[],
            2021,
            Level::District,
            Path::new("/nonexistent"),
            TIMEOUT,
            &sink,
        )
        .await;
        assert!(done);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(sink.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_true_on_first_poll_when_all_files_settled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("DISTGRAD.csv"), b"x").unwrap();
        std::fs::write(dir.path().join("DREF.csv"), b"x").unwrap();

        let sink = MemorySink::new();
        let start = Instant::now();
        let done = wait_for_completion(
            &["GRAD".to_string(), "REF".to_string()],
            2021,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;

        assert!(done);
        assert_eq!(start.elapsed(), Duration::ZERO, "no poll cycle should pass");
        assert_eq!(
            sink.lines(),
            vec!["All downloads for 2021 completed successfully."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_years_expect_dat_files() {
        let dir = tempfile::tempdir().unwrap();
        // A .csv is not good enough for 2019.
        std::fs::write(dir.path().join("DISTGRAD.csv"), b"x").unwrap();

        let sink = MemorySink::new();
        let done = wait_for_completion(
            &["GRAD".to_string()],
            2019,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;
        assert!(!done);

        std::fs::write(dir.path().join("DISTGRAD.dat"), b"x").unwrap();
        let done = wait_for_completion(
            &["GRAD".to_string()],
            2019,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;
        assert!(done);
    }

    #[tokio::test(start_paused = true)]
    async fn in_progress_marker_blocks_completion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("DISTGRAD.csv"), b"x").unwrap();
        std::fs::write(dir.path().join("DISTGRAD.csv.crdownload"), b"x").unwrap();

        let sink = MemorySink::new();
        let done = wait_for_completion(
            &["GRAD".to_string()],
            2022,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;
        assert!(!done);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_deadline_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();

        let sink = MemorySink::new();
        let start = Instant::now();
        let done = wait_for_completion(
            &["GRAD".to_string()],
            2021,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;

        assert!(!done);
        let elapsed = start.elapsed();
        assert!(
            elapsed >= TIMEOUT && elapsed <= TIMEOUT + Duration::from_secs(POLL_INTERVAL_SECS),
            "deadline should bound the wait to within one poll interval, got {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_message_is_emitted_once() {
        let dir = tempfile::tempdir().unwrap();

        let sink = MemorySink::new();
        let done = wait_for_completion(
            &["GRAD".to_string()],
            2021,
            Level::District,
            dir.path(),
            TIMEOUT,
            &sink,
        )
        .await;

        assert!(!done);
        let waiting: Vec<String> = sink
            .lines()
            .into_iter()
            .filter(|line| line.contains("Waiting"))
            .collect();
        assert_eq!(waiting.len(), 1, "waiting line must not repeat every poll");
    }
}
