//! CSV export of the journal.
//!
//! One row per entry, in the order given (newest first when fed straight from
//! the store). Missing numbers become empty cells.

use crate::{Entry, Result};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Glycemia (g/L)")]
    glycemia: Option<f64>,
    #[serde(rename = "Rapid insulin (U)")]
    rapid_insulin: Option<f64>,
    #[serde(rename = "Basal insulin (U)")]
    basal_insulin: Option<f64>,
    #[serde(rename = "Medications")]
    medications: String,
    #[serde(rename = "Notes")]
    notes: String,
}

impl From<&Entry> for CsvRow {
    fn from(entry: &Entry) -> Self {
        let medications = entry
            .medications
            .iter()
            .map(|m| {
                let dose = if m.dose.is_empty() { "-" } else { m.dose.as_str() };
                format!("{} ({})", m.name, dose)
            })
            .collect::<Vec<_>>()
            .join("; ");

        CsvRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            time: entry.time.format("%H:%M").to_string(),
            category: entry.category.label().to_string(),
            glycemia: entry.reading(),
            rapid_insulin: entry.rapid_insulin,
            basal_insulin: entry.basal_insulin,
            medications,
            notes: entry.notes.clone().unwrap_or_default(),
        }
    }
}

/// Write entries as CSV (with a header row) to any writer
///
/// Returns the number of data rows written.
pub fn write_entries_csv<W: Write>(entries: &[Entry], writer: W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for entry in entries {
        writer.serialize(CsvRow::from(entry))?;
    }
    writer.flush()?;
    Ok(entries.len())
}

/// Export entries to a CSV file, replacing it if present
pub fn export_entries_csv(entries: &[Entry], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let count = write_entries_csv(entries, &file)?;
    file.sync_all()?;

    tracing::info!("Exported {} entries to {:?}", count, path);
    Ok(count)
}

/// Default export file name for a user on a given day
pub fn default_export_file_name(user: &str, today: NaiveDate) -> String {
    format!("glyco_{}_{}.csv", user, today.format("%Y-%m-%d"))
}
