//! Batch request boundary: administrative level and validated parameters.
//!
//! The presentation layer (CLI, or any other front end) collects raw strings;
//! this module turns them into an immutable [`Request`] value that has already
//! passed every fail-fast check, so the orchestrator never revisits input
//! validation mid-batch.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors rejected at the request boundary, before any year is processed.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The target directory does not exist or is not a directory.
    #[error("{path} is not a valid directory")]
    InvalidDirectory {
        /// The path that failed to resolve.
        path: PathBuf,
    },

    /// The level string is not one of the four recognized levels.
    #[error("invalid level {input:?}: must be one of C, D, R, S (or Campus, District, Region, State)")]
    InvalidLevel {
        /// The rejected input.
        input: String,
    },

    /// No usable years were supplied.
    #[error("no years requested")]
    EmptyYears,

    /// No usable variable codes were supplied.
    #[error("no variables requested")]
    EmptyVariables,
}

impl RequestError {
    /// Creates an invalid-directory error.
    pub fn invalid_directory(path: impl Into<PathBuf>) -> Self {
        Self::InvalidDirectory { path: path.into() }
    }

    /// Creates an invalid-level error.
    pub fn invalid_level(input: impl Into<String>) -> Self {
        Self::InvalidLevel {
            input: input.into(),
        }
    }
}

/// Administrative granularity of a report.
///
/// Each level carries two fixed tokens used in file names: a single-letter
/// code (`C`/`D`/`R`/`S`) and a file prefix (`CAMP`/`DIST`/`REGN`/`STATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Campus,
    District,
    Region,
    State,
}

impl Level {
    /// Parses a level from its single-letter code or full display name,
    /// case-insensitive.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "C" | "CAMPUS" => Ok(Self::Campus),
            "D" | "DISTRICT" => Ok(Self::District),
            "R" | "REGION" => Ok(Self::Region),
            "S" | "STATE" => Ok(Self::State),
            _ => Err(RequestError::invalid_level(input)),
        }
    }

    /// The single-letter code the portal uses for level selection.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Campus => "C",
            Self::District => "D",
            Self::Region => "R",
            Self::State => "S",
        }
    }

    /// The file-name prefix the portal uses for this level's data files.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Campus => "CAMP",
            Self::District => "DIST",
            Self::Region => "REGN",
            Self::State => "STATE",
        }
    }

    /// The human-readable level name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Campus => "Campus",
            Self::District => "District",
            Self::Region => "Region",
            Self::State => "State",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An immutable, validated batch request.
///
/// Constructed once per invocation and passed by reference into the
/// orchestrator. Years are processed in the order given; variables keep
/// their order but behave as a set (duplicates are dropped at parse time).
#[derive(Debug, Clone)]
pub struct Request {
    /// Directory the per-year `raw_data{year}` folders are created under.
    pub directory: PathBuf,
    /// School years to fetch, identified by the ending year (2018 = 2017-18).
    pub years: Vec<i32>,
    /// Variable codes to fetch (e.g. `GRAD`, `STAAR1`, `REF`).
    pub variables: Vec<String>,
    /// Administrative level of the requested reports.
    pub level: Level,
    /// Whether to also fetch the district type dataset at District level.
    pub include_secondary: bool,
}

impl Request {
    /// Builds a request, failing fast on an invalid directory or empty
    /// year/variable lists.
    pub fn new(
        directory: impl Into<PathBuf>,
        years: Vec<i32>,
        variables: Vec<String>,
        level: Level,
        include_secondary: bool,
    ) -> Result<Self, RequestError> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(RequestError::invalid_directory(directory));
        }
        if years.is_empty() {
            return Err(RequestError::EmptyYears);
        }
        if variables.is_empty() {
            return Err(RequestError::EmptyVariables);
        }
        Ok(Self {
            directory,
            years,
            variables,
            level,
            include_secondary,
        })
    }
}

/// Parses a comma-separated year list, dropping tokens that are not
/// positive integers.
#[must_use]
pub fn parse_years(input: &str) -> Vec<i32> {
    input
        .split(',')
        .filter_map(|token| token.trim().parse::<i32>().ok())
        .filter(|&year| year > 0)
        .collect()
}

/// Parses a comma-separated variable list: trimmed, uppercased, duplicates
/// dropped with first-seen order preserved.
#[must_use]
pub fn parse_variables(input: &str) -> Vec<String> {
    let mut variables: Vec<String> = Vec::new();
    for token in input.split(',') {
        let variable = token.trim().to_ascii_uppercase();
        if !variable.is_empty() && !variables.contains(&variable) {
            variables.push(variable);
        }
    }
    variables
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_codes_and_names() {
        assert_eq!(Level::parse("C").unwrap(), Level::Campus);
        assert_eq!(Level::parse("district").unwrap(), Level::District);
        assert_eq!(Level::parse(" Region ").unwrap(), Level::Region);
        assert_eq!(Level::parse("s").unwrap(), Level::State);
    }

    #[test]
    fn level_rejects_unknown_input() {
        let err = Level::parse("county").unwrap_err();
        assert!(matches!(err, RequestError::InvalidLevel { .. }));
        assert!(err.to_string().contains("county"));
    }

    #[test]
    fn level_tokens_match_portal_conventions() {
        assert_eq!(Level::Campus.prefix(), "CAMP");
        assert_eq!(Level::District.prefix(), "DIST");
        assert_eq!(Level::Region.prefix(), "REGN");
        assert_eq!(Level::State.prefix(), "STATE");
        assert_eq!(Level::District.code(), "D");
        assert_eq!(Level::District.to_string(), "District");
    }

    #[test]
    fn parse_years_keeps_positive_integers_only() {
        assert_eq!(parse_years("2019, 2021,abc, -5, 2024"), vec![2019, 2021, 2024]);
        assert!(parse_years("").is_empty());
    }

    #[test]
    fn parse_variables_uppercases_and_dedupes_in_order() {
        assert_eq!(
            parse_variables("grad, REF, Grad , staar1,,"),
            vec!["GRAD", "REF", "STAAR1"]
        );
    }

    #[test]
    fn request_rejects_missing_directory() {
        let err = Request::new(
            "/definitely/not/a/real/path",
            vec![2021],
            vec!["GRAD".to_string()],
            Level::District,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidDirectory { .. }));
    }

    #[test]
    fn request_rejects_empty_years_and_variables() {
        let dir = tempfile::tempdir().unwrap();
        let err = Request::new(
            dir.path(),
            vec![],
            vec!["GRAD".to_string()],
            Level::State,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::EmptyYears));

        let err = Request::new(dir.path(), vec![2021], vec![], Level::State, false).unwrap_err();
        assert!(matches!(err, RequestError::EmptyVariables));
    }

    #[test]
    fn request_accepts_valid_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::new(
            dir.path(),
            vec![2019, 2021],
            vec!["REF".to_string(), "GRAD".to_string()],
            Level::District,
            true,
        )
        .unwrap();
        assert_eq!(request.years, vec![2019, 2021]);
        assert!(request.include_secondary);
    }
}
