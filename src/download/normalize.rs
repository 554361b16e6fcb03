//! Renames downloads to canonical names and converts legacy files to CSV.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::progress::ProgressSink;
use crate::request::Level;

use super::{CSV_EXT, LEGACY_EXT, naming};

/// Renames the first matching as-downloaded file for `variable` to its
/// canonical `{token}{VAR}_{year}.{ext}` name.
///
/// Extensions are tried `.csv` then `.dat`; within each, the prefix-based
/// pattern before the level-based one. The call stops after the first
/// successful rename: only one era-appropriate file is expected per
/// variable, and a second plausible match is deliberately left alone.
///
/// Returns `Ok(true)` when a file was renamed, `Ok(false)` when nothing
/// matched.
pub fn rename_canonical(
    directory: &Path,
    year: i32,
    variable: &str,
    level: Level,
) -> io::Result<bool> {
    for ext in [CSV_EXT, LEGACY_EXT] {
        let old_names = [
            format!("{}{variable}.{ext}", level.prefix()),
            format!("{}{variable}.{ext}", level.code()),
        ];
        for old_name in old_names {
            let old_path = directory.join(&old_name);
            if !old_path.is_file() {
                continue;
            }
            let new_path = directory.join(naming::canonical_file_name(level, variable, year, ext));
            fs::rename(&old_path, &new_path)?;
            debug!(from = %old_path.display(), to = %new_path.display(), "renamed download");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Converts every legacy `.dat` file in `directory` to a `.csv` sibling.
///
/// The delimiter is sniffed per file. A file that fails to parse is
/// reported through `progress` and skipped; the rest still convert.
pub fn convert_dat_files(directory: &Path, progress: &dyn ProgressSink) {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(directory = %directory.display(), %error, "cannot list directory for conversion");
            progress.emit(&format!("Directory '{}' does not exist.", directory.display()));
            return;
        }
    };

    for entry in entries.flatten() {
        let dat_path = entry.path();
        if dat_path.extension().and_then(|ext| ext.to_str()) != Some(LEGACY_EXT) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let csv_path = dat_path.with_extension(CSV_EXT);
        match convert_one(&dat_path, &csv_path) {
            Ok(()) => {
                progress.emit(&format!("Converted: {file_name} -> {}", csv_path.display()));
            }
            Err(error) => {
                warn!(file = %dat_path.display(), %error, "legacy conversion failed");
                progress.emit(&format!("Error converting {file_name}: {error}"));
            }
        }
    }
}

fn convert_one(dat_path: &Path, csv_path: &Path) -> Result<(), csv::Error> {
    let raw = fs::read_to_string(dat_path)?;
    let delimiter = sniff_delimiter(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(csv_path)?;
    for record in reader.records() {
        writer.write_record(&record?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Picks the candidate delimiter that appears most often in the first line.
/// Comma wins ties and empty input.
fn sniff_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");
    let count = |delim: u8| first_line.bytes().filter(|&b| b == delim).count();

    let mut best = b',';
    let mut best_count = count(b',');
    for candidate in [b'\t', b';', b'|'] {
        let candidate_count = count(candidate);
        if candidate_count > best_count {
            best = candidate;
            best_count = candidate_count;
        }
    }
    best
}
