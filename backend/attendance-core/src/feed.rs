// src/feed.rs
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::calendar::{CalendarBasis, DateInput};
use crate::error::FeedError;

const DEFAULT_DATE_COLUMN: &str = "date";

// --- CSV Attendance Feed ---

pub fn read_attendance_file(
    path: &Path,
    column: Option<&str>,
) -> Result<Vec<DateInput>, FeedError> {
    let file = File::open(path)?;
    let records = read_attendance_csv(file, column)?;
    info!(
        "Read {} attendance records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Reads one date per row from a CSV attendance export.
///
/// The date column is `column` if given, otherwise a column named `date`
/// (case-insensitive), otherwise the first column. When no column was asked
/// for and the first row already holds a date, the file is treated as having
/// no header. Blank cells and undecodable rows are skipped, the first row
/// included; date validity is left to the evaluator.
pub fn read_attendance_csv<R: Read>(
    reader: R,
    column: Option<&str>,
) -> Result<Vec<DateInput>, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match StringRecord::from_byte_record(csv_reader.byte_headers()?.clone()) {
        Ok(headers) => Some(headers),
        Err(e) => {
            debug!("Skipping undecodable attendance header row: {}", e.utf8_error());
            None
        }
    };
    let find_column = |name: &str| {
        headers
            .as_ref()
            .and_then(|h| h.iter().position(|cell| cell.eq_ignore_ascii_case(name)))
    };

    let mut records = Vec::new();
    let index = match column {
        Some(name) => {
            find_column(name).ok_or_else(|| FeedError::MissingColumn(name.to_string()))?
        }
        None => match find_column(DEFAULT_DATE_COLUMN) {
            Some(index) => index,
            None => {
                // Headerless export: the first row is data
                if let Some(first) = headers.as_ref().and_then(|h| h.get(0)) {
                    let candidate = DateInput::from(first);
                    if candidate.to_calendar_date(&CalendarBasis::utc()).is_some() {
                        records.push(candidate);
                    }
                }
                0
            }
        },
    };

    for (row, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping undecodable attendance row {}: {}", row + 1, e);
                continue;
            }
        };
        match record.get(index) {
            Some(cell) if !cell.is_empty() => records.push(DateInput::from(cell)),
            _ => debug!(
                "Skipping attendance row {} with no date in column {}",
                row + 1,
                index
            ),
        }
    }

    Ok(records)
}
