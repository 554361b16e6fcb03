//! File naming convention for downloaded report files.
//!
//! The portal emits files named `{PREFIX}{VAR}.{ext}` — except the REF
//! variable, which carries the level code instead of the prefix, and except
//! when it doesn't: some years emit the level code for other variables too.
//! Every function here is pure apart from [`already_present`], which only
//! reads directory entries.

use std::path::Path;

use crate::request::Level;

use super::{CSV_EXT, ERA_CUTOFF_YEAR, LEGACY_EXT, REF_VARIABLE};

/// Returns the extension the portal emits for `year`.
#[must_use]
pub fn era_extension(year: i32) -> &'static str {
    if year < ERA_CUTOFF_YEAR { LEGACY_EXT } else { CSV_EXT }
}

fn name_token(level: Level, variable: &str) -> &'static str {
    if variable == REF_VARIABLE {
        level.code()
    } else {
        level.prefix()
    }
}

/// The single stable post-rename name for a `(level, variable, year)` file.
///
/// REF files carry the level code; all other variables carry the prefix.
#[must_use]
pub fn canonical_file_name(level: Level, variable: &str, year: i32, ext: &str) -> String {
    format!("{}{variable}_{year}.{ext}", name_token(level, variable))
}

/// The name a file lands under before renaming, as the portal pushes it.
#[must_use]
pub fn download_file_name(level: Level, variable: &str, ext: &str) -> String {
    format!("{}{variable}.{ext}", name_token(level, variable))
}

/// Every name under which a `(variable, year)` file may already exist.
///
/// The portal is inconsistent about prefix vs level tokens, so both are
/// accepted for both extensions. A match on any candidate counts as
/// present, even though that may alias two legitimately distinct files;
/// this permissive behavior is intentional.
#[must_use]
pub fn presence_candidates(level: Level, variable: &str, year: i32) -> [String; 4] {
    [
        format!("{}{variable}_{year}.{CSV_EXT}", level.prefix()),
        format!("{}{variable}_{year}.{LEGACY_EXT}", level.prefix()),
        format!("{}{variable}_{year}.{CSV_EXT}", level.code()),
        format!("{}{variable}_{year}.{LEGACY_EXT}", level.code()),
    ]
}

/// File-presence oracle: true when any candidate name exists as a regular
/// file in `directory`.
#[must_use]
pub fn already_present(directory: &Path, level: Level, variable: &str, year: i32) -> bool {
    presence_candidates(level, variable, year)
        .iter()
        .any(|name| directory.join(name).is_file())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn era_extension_switches_at_cutoff() {
        assert_eq!(era_extension(2020), "dat");
        assert_eq!(era_extension(2021), "csv");
        assert_eq!(era_extension(2018), "dat");
        assert_eq!(era_extension(2024), "csv");
    }

    #[test]
    fn canonical_name_uses_prefix_for_ordinary_variables() {
        assert_eq!(
            canonical_file_name(Level::District, "GRAD", 2019, "dat"),
            "DISTGRAD_2019.dat"
        );
        assert_eq!(
            canonical_file_name(Level::Campus, "STAAR1", 2022, "csv"),
            "CAMPSTAAR1_2022.csv"
        );
    }

    #[test]
    fn canonical_name_uses_level_code_for_ref() {
        assert_eq!(
            canonical_file_name(Level::District, "REF", 2019, "dat"),
            "DREF_2019.dat"
        );
        assert_eq!(
            canonical_file_name(Level::State, "REF", 2023, "csv"),
            "SREF_2023.csv"
        );
    }

    #[test]
    fn download_name_has_no_year_suffix() {
        assert_eq!(download_file_name(Level::District, "GRAD", "csv"), "DISTGRAD.csv");
        assert_eq!(download_file_name(Level::District, "REF", "dat"), "DREF.dat");
    }

    #[test]
    fn presence_candidates_cover_both_tokens_and_extensions() {
        let candidates = presence_candidates(Level::Region, "PROF", 2020);
        assert_eq!(
            candidates,
            [
                "REGNPROF_2020.csv".to_string(),
                "REGNPROF_2020.dat".to_string(),
                "RPROF_2020.csv".to_string(),
                "RPROF_2020.dat".to_string(),
            ]
        );
    }

    #[test]
    fn already_present_matches_any_candidate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!already_present(dir.path(), Level::District, "GRAD", 2019));

        // A level-token .dat file counts even though the prefix form is
        // the usual one.
        std::fs::write(dir.path().join("DGRAD_2019.dat"), b"x").unwrap();
        assert!(already_present(dir.path(), Level::District, "GRAD", 2019));
        assert!(!already_present(dir.path(), Level::District, "GRAD", 2020));
        assert!(!already_present(dir.path(), Level::District, "REF", 2019));
    }

    #[test]
    fn already_present_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("DISTGRAD_2019.dat")).unwrap();
        assert!(!already_present(dir.path(), Level::District, "GRAD", 2019));
    }
}
