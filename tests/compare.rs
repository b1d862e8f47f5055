use std::path::Path;

use assert_matches::assert_matches;

use structural_fetch::compare::{CompareStatus, compare_file, compare_snapshots, write_summary};
use structural_fetch::error::FetchError;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

struct Dirs {
    _temp: tempfile::TempDir,
    original: std::path::PathBuf,
    trial: std::path::PathBuf,
}

fn dirs() -> Dirs {
    let temp = tempfile::tempdir().unwrap();
    let original = temp.path().join("original");
    let trial = temp.path().join("trial");
    std::fs::create_dir_all(&original).unwrap();
    std::fs::create_dir_all(&trial).unwrap();
    Dirs {
        _temp: temp,
        original,
        trial,
    }
}

#[test]
fn reordered_rows_still_match() {
    let dirs = dirs();
    write(
        &dirs.original,
        "gdp.csv",
        "Date,Value\n2020-01-01,1.0\n2020-02-01,2.0\n",
    );
    write(
        &dirs.trial,
        "gdp.csv",
        "Date,Value\n2020-02-01 00:00:00,2.0\n2020-01-01 00:00:00,1.0\n",
    );

    let result = compare_file(&dirs.original, &dirs.trial, "gdp.csv").unwrap();

    assert_eq!(result.status, CompareStatus::ExactMatch);
    assert!(result.matched);
    assert_eq!(result.rows_original, 2);
    assert_eq!(result.max_diff, Some(0.0));
}

#[test]
fn value_difference_is_reported() {
    let dirs = dirs();
    write(&dirs.original, "debt.csv", "Date,Value\n2020-01-01,1.0\n");
    write(&dirs.trial, "debt.csv", "Date,Value\n2020-01-01,1.25\n");

    let result = compare_file(&dirs.original, &dirs.trial, "debt.csv").unwrap();

    assert_eq!(result.status, CompareStatus::ValueDiff);
    assert!(!result.matched);
    assert_eq!(result.max_diff, Some(0.25));
}

#[test]
fn blanked_trial_values_are_not_a_match() {
    let dirs = dirs();
    write(&dirs.original, "gdp.csv", "Date,Value\n2020-01-01,1.5\n2020-02-01,2.5\n");
    write(&dirs.trial, "gdp.csv", "Date,Value\n2020-01-01,\n2020-02-01,\n");

    let result = compare_file(&dirs.original, &dirs.trial, "gdp.csv").unwrap();

    assert_eq!(result.status, CompareStatus::ValueDiff);
    assert!(!result.matched);
    assert_eq!(result.max_diff, None);
}

#[test]
fn value_missing_on_one_side_is_a_difference() {
    let dirs = dirs();
    write(&dirs.original, "gdp.csv", "Date,Value\n2020-01-01,1.5\n2020-02-01,2.5\n");
    write(&dirs.trial, "gdp.csv", "Date,Value\n2020-01-01,1.5\n2020-02-01,n/a\n");

    let result = compare_file(&dirs.original, &dirs.trial, "gdp.csv").unwrap();

    assert_eq!(result.status, CompareStatus::ValueDiff);
    assert!(!result.matched);
    assert_eq!(result.max_diff, Some(0.0));
}

#[test]
fn values_missing_on_both_sides_are_skipped() {
    let dirs = dirs();
    let content = "Date,Value\n2020-01-01,1.5\n2020-02-01,\n";
    write(&dirs.original, "gdp.csv", content);
    write(&dirs.trial, "gdp.csv", content);

    let result = compare_file(&dirs.original, &dirs.trial, "gdp.csv").unwrap();

    assert_eq!(result.status, CompareStatus::ExactMatch);
    assert!(result.matched);
}

#[test]
fn shape_and_date_mismatches() {
    let dirs = dirs();
    write(&dirs.original, "rows.csv", "Date,Value\n2020-01-01,1\n2020-02-01,2\n");
    write(&dirs.trial, "rows.csv", "Date,Value\n2020-01-01,1\n");
    write(&dirs.original, "cols.csv", "Date,Value\n2020-01-01,1\n");
    write(&dirs.trial, "cols.csv", "Date,Value,Extra\n2020-01-01,1,x\n");
    write(&dirs.original, "dates.csv", "Date,Value\n2020-01-01,1\n2020-02-01,2\n");
    write(&dirs.trial, "dates.csv", "Date,Value\n2020-01-01,1\n2020-03-01,2\n");

    let rows = compare_file(&dirs.original, &dirs.trial, "rows.csv").unwrap();
    assert_eq!(rows.status, CompareStatus::ShapeMismatch);
    assert_eq!((rows.rows_original, rows.rows_trial), (2, 1));

    let cols = compare_file(&dirs.original, &dirs.trial, "cols.csv").unwrap();
    assert_eq!(cols.status, CompareStatus::ShapeMismatch);

    let dates = compare_file(&dirs.original, &dirs.trial, "dates.csv").unwrap();
    assert_eq!(dates.status, CompareStatus::DateMismatch);
    assert!(dates.max_diff.is_none());
}

#[test]
fn missing_files() {
    let dirs = dirs();
    write(&dirs.original, "only_original.csv", "Date,Value\n");
    write(&dirs.trial, "only_trial.csv", "Date,Value\n");

    let original_only = compare_file(&dirs.original, &dirs.trial, "only_original.csv").unwrap();
    assert_eq!(original_only.status, CompareStatus::MissingTrial);

    let trial_only = compare_file(&dirs.original, &dirs.trial, "only_trial.csv").unwrap();
    assert_eq!(trial_only.status, CompareStatus::MissingOriginal);
}

#[test]
fn missing_value_column_is_an_error() {
    let dirs = dirs();
    write(&dirs.original, "bad.csv", "Date,Amount\n2020-01-01,1\n");
    write(&dirs.trial, "bad.csv", "Date,Amount\n2020-01-01,1\n");

    let err = compare_file(&dirs.original, &dirs.trial, "bad.csv").unwrap_err();
    assert_matches!(err, FetchError::SnapshotRead { message, .. } if message.contains("Value"));
}

#[test]
fn default_list_and_summary_csv() {
    let dirs = dirs();
    write(&dirs.original, "b.csv", "Date,Value\n2020-01-01,1\n");
    write(&dirs.original, "a.csv", "Date,Value\n2020-01-01,1\n");
    write(&dirs.original, "notes.txt", "ignored");
    write(&dirs.trial, "a.csv", "Date,Value\n2020-01-01,1\n");

    let result = compare_snapshots(&dirs.original, &dirs.trial, &[]).unwrap();

    let files: Vec<&str> = result.files.iter().map(|file| file.file.as_str()).collect();
    assert_eq!(files, vec!["a.csv", "b.csv"]);
    assert_eq!(result.total, 2);
    assert_eq!(result.exact_matches, 1);
    assert_eq!(result.mismatches, 1);
    assert!(!result.all_match());

    let summary = dirs.trial.join("report").join("summary.csv");
    write_summary(&summary, &result).unwrap();
    let content = std::fs::read_to_string(&summary).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "file,status,match,rows_original,rows_trial,max_diff");
    assert_eq!(lines[1], "a.csv,EXACT_MATCH,true,1,1,0.0");
    assert_eq!(lines[2], "b.csv,MISSING_TRIAL,false,0,0,");
}
