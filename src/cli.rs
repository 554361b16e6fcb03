//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use tapr_core::DEFAULT_WATCH_TIMEOUT_SECS;

/// Batch download and normalize Texas Academic Performance Report data.
///
/// Drives the TAPR advanced download portal for the requested years and
/// variables, waits for the files to land, renames them into a stable
/// `{PREFIX}{VAR}_{year}` convention, and converts legacy `.dat` files
/// to `.csv`.
#[derive(Parser, Debug)]
#[command(name = "tapr-scraper")]
#[command(author, version, about)]
pub struct Args {
    /// Directory the per-year raw_data folders are created under
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Comma-separated school years, named by their ending year
    /// (2018 means the 2017-18 school year)
    #[arg(short, long)]
    pub years: String,

    /// Comma-separated variable codes (e.g. GRAD,STAAR1,PROF)
    #[arg(long)]
    pub variables: String,

    /// Administrative level: C, D, R, S or Campus/District/Region/State
    #[arg(short, long)]
    pub level: String,

    /// Skip the district type dataset at District level
    #[arg(long)]
    pub no_district_types: bool,

    /// Seconds to wait for each year's downloads to settle (5-3600)
    #[arg(long, default_value_t = DEFAULT_WATCH_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(5..=3600))]
    pub timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "tapr-scraper",
            "--directory",
            "/tmp/data",
            "--years",
            "2019,2021",
            "--variables",
            "GRAD,REF",
            "--level",
            "D",
        ]
    }

    #[test]
    fn test_cli_parses_required_arguments() {
        let args = Args::try_parse_from(base_args()).unwrap();
        assert_eq!(args.directory, PathBuf::from("/tmp/data"));
        assert_eq!(args.years, "2019,2021");
        assert_eq!(args.variables, "GRAD,REF");
        assert_eq!(args.level, "D");
        assert!(!args.no_district_types);
        assert_eq!(args.timeout, 200);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_requires_directory() {
        let result = Args::try_parse_from(["tapr-scraper", "--years", "2021"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_district_types_flag() {
        let mut argv = base_args();
        argv.push("--no-district-types");
        let args = Args::try_parse_from(argv).unwrap();
        assert!(args.no_district_types);
    }

    #[test]
    fn test_cli_timeout_range_is_enforced() {
        let mut argv = base_args();
        argv.extend(["--timeout", "4"]);
        assert!(Args::try_parse_from(argv).is_err());

        let mut argv = base_args();
        argv.extend(["--timeout", "30"]);
        assert_eq!(Args::try_parse_from(argv).unwrap().timeout, 30);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let mut argv = base_args();
        argv.push("-vv");
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["tapr-scraper", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
