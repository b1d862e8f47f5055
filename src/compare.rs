//! Integrity check between an original data folder and a trial copy of it.
//! Files are compared on their `Date`/`Value` columns after sorting by date.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::FetchError;

pub const EXACT_TOLERANCE: f64 = 1e-10;
pub const DATE_COLUMN: &str = "Date";
pub const VALUE_COLUMN: &str = "Value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareStatus {
    MissingOriginal,
    MissingTrial,
    ShapeMismatch,
    DateMismatch,
    ExactMatch,
    ValueDiff,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileComparison {
    pub file: String,
    pub status: CompareStatus,
    #[serde(rename = "match")]
    pub matched: bool,
    pub rows_original: usize,
    pub rows_trial: usize,
    pub max_diff: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareResult {
    pub total: usize,
    pub exact_matches: usize,
    pub mismatches: usize,
    pub files: Vec<FileComparison>,
}

impl CompareResult {
    pub fn from_files(files: Vec<FileComparison>) -> Self {
        let exact_matches = files.iter().filter(|file| file.matched).count();
        Self {
            total: files.len(),
            exact_matches,
            mismatches: files.len() - exact_matches,
            files,
        }
    }

    pub fn all_match(&self) -> bool {
        self.mismatches == 0
    }
}

#[derive(Debug, Clone)]
struct DateKey {
    parsed: Option<NaiveDateTime>,
    raw: String,
}

impl DateKey {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            });
        Self {
            parsed,
            raw: raw.to_string(),
        }
    }

    fn same_instant(&self, other: &DateKey) -> bool {
        match (self.parsed, other.parsed) {
            (Some(left), Some(right)) => left == right,
            _ => self.raw == other.raw,
        }
    }

    fn sort_cmp(&self, other: &DateKey) -> Ordering {
        self.parsed
            .cmp(&other.parsed)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

struct Snapshot {
    columns: usize,
    rows: Vec<(DateKey, f64)>,
}

fn read_snapshot(path: &Path) -> Result<Snapshot, FetchError> {
    let read_err = |message: String| FetchError::SnapshotRead {
        path: path.display().to_string(),
        message,
    };
    let mut reader = csv::Reader::from_path(path).map_err(|err| read_err(err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| read_err(err.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| read_err(format!("missing column {name}")))
    };
    let date_idx = column(DATE_COLUMN)?;
    let value_idx = column(VALUE_COLUMN)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| read_err(err.to_string()))?;
        let date = DateKey::parse(record.get(date_idx).unwrap_or_default());
        let value = record
            .get(value_idx)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        rows.push((date, value));
    }
    rows.sort_by(|left, right| left.0.sort_cmp(&right.0));

    Ok(Snapshot {
        columns: headers.len(),
        rows,
    })
}

pub fn compare_file(
    original_dir: &Path,
    trial_dir: &Path,
    file: &str,
) -> Result<FileComparison, FetchError> {
    let original_path = original_dir.join(file);
    let trial_path = trial_dir.join(file);
    let mut comparison = FileComparison {
        file: file.to_string(),
        status: CompareStatus::MissingOriginal,
        matched: false,
        rows_original: 0,
        rows_trial: 0,
        max_diff: None,
    };

    if !original_path.is_file() {
        return Ok(comparison);
    }
    if !trial_path.is_file() {
        comparison.status = CompareStatus::MissingTrial;
        return Ok(comparison);
    }

    let original = read_snapshot(&original_path)?;
    let trial = read_snapshot(&trial_path)?;
    comparison.rows_original = original.rows.len();
    comparison.rows_trial = trial.rows.len();

    if original.rows.len() != trial.rows.len() || original.columns != trial.columns {
        comparison.status = CompareStatus::ShapeMismatch;
        return Ok(comparison);
    }

    let dates_match = original
        .rows
        .iter()
        .zip(&trial.rows)
        .all(|(left, right)| left.0.same_instant(&right.0));
    if !dates_match {
        comparison.status = CompareStatus::DateMismatch;
        return Ok(comparison);
    }

    // Rows missing on both sides are skipped; missing on one side only is a
    // difference. No comparable value at all never counts as a match.
    let mut max_diff: Option<f64> = None;
    let mut one_sided = false;
    for (left, right) in original.rows.iter().zip(&trial.rows) {
        match (left.1.is_nan(), right.1.is_nan()) {
            (false, false) => {
                let diff = (left.1 - right.1).abs();
                max_diff = Some(max_diff.map_or(diff, |max| max.max(diff)));
            }
            (true, true) => {}
            _ => one_sided = true,
        }
    }
    if original.rows.is_empty() {
        max_diff = Some(0.0);
    }

    comparison.matched = !one_sided && max_diff.is_some_and(|diff| diff < EXACT_TOLERANCE);
    comparison.status = if comparison.matched {
        CompareStatus::ExactMatch
    } else {
        CompareStatus::ValueDiff
    };
    comparison.max_diff = max_diff;
    Ok(comparison)
}

/// Every `*.csv` in the original directory, sorted by name.
pub fn default_file_list(original_dir: &Path) -> Result<Vec<String>, FetchError> {
    let entries = fs::read_dir(original_dir).map_err(|err| FetchError::SnapshotRead {
        path: original_dir.display().to_string(),
        message: err.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}

pub fn compare_snapshots(
    original_dir: &Path,
    trial_dir: &Path,
    files: &[String],
) -> Result<CompareResult, FetchError> {
    let files = if files.is_empty() {
        default_file_list(original_dir)?
    } else {
        files.to_vec()
    };
    let comparisons = files
        .iter()
        .map(|file| compare_file(original_dir, trial_dir, file))
        .collect::<Result<Vec<_>, FetchError>>()?;
    Ok(CompareResult::from_files(comparisons))
}

pub fn write_summary(path: &Path, result: &CompareResult) -> Result<(), FetchError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| FetchError::Filesystem(err.to_string()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).map_err(|err| FetchError::Filesystem(err.to_string()))?;
    for file in &result.files {
        writer
            .serialize(file)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| FetchError::Filesystem(err.to_string()))
}
