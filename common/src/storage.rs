use crate::error::{FetchError, Result};
use crate::models::{HistoryRecord, HistoryRow, Timeframe, TokenHistory};
use crate::utils::{format_timestamp, round_to};
use chrono::{Datelike, NaiveDate};
use csv::WriterBuilder;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PRECISION: i32 = 9;

const HEADER: [&str; 9] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Average",
    "Close",
    "Change",
    "Volume",
    "Volume Change",
];

pub fn output_path(
    directory: &Path,
    token_name: &str,
    timeframe: Timeframe,
    aggregate: u32,
    date: NaiveDate,
) -> PathBuf {
    directory.join(format!(
        "{}_per_{}_{}_{}_{:02}_{:02}.csv",
        token_name,
        timeframe,
        aggregate,
        date.year(),
        date.month(),
        date.day()
    ))
}

fn to_record(row: &HistoryRow) -> HistoryRecord {
    HistoryRecord {
        date: format_timestamp(row.timestamp),
        open: round_to(row.open, PRECISION),
        high: round_to(row.high, PRECISION),
        low: round_to(row.low, PRECISION),
        average: round_to(row.average, PRECISION),
        close: round_to(row.close, PRECISION),
        change: round_to(row.change, PRECISION),
        volume: round_to(row.volume, PRECISION),
        volume_change: round_to(row.volume_change, PRECISION),
    }
}

/// Writes one token's history as CSV and returns the file written.
pub fn save_history(
    history: &TokenHistory,
    token_name: &str,
    directory: &Path,
    timeframe: Timeframe,
    aggregate: u32,
    date: NaiveDate,
) -> Result<PathBuf> {
    let path = output_path(directory, token_name, timeframe, aggregate, date);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(|e| FetchError::persistence(parent, e))?;
    }

    let mut rows: Vec<&HistoryRow> = history.rows.iter().collect();
    rows.sort_by_key(|r| r.timestamp);

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(|e| FetchError::persistence(&path, e))?;

    writer
        .write_record(HEADER)
        .map_err(|e| FetchError::persistence(&path, e))?;
    for row in rows {
        writer
            .serialize(to_record(row))
            .map_err(|e| FetchError::persistence(&path, e))?;
    }
    writer
        .flush()
        .map_err(|e| FetchError::persistence(&path, e))?;

    info!(
        "Saved {} rows for {} to {}",
        history.len(),
        token_name,
        path.display()
    );
    Ok(path)
}
