//! Minimal in-memory tabular value.
//!
//! Shared by the district type fetcher (spreadsheet rows) and CSV output.

use std::path::Path;

/// A header row plus data rows, all cells as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names. May be empty when the source had no header row.
    pub headers: Vec<String>,
    /// Data rows, one `Vec` of cells per row.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table from headers and rows.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// True when the table has neither headers nor rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Writes the table as CSV. No synthetic index column is added.
    pub fn write_csv(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
