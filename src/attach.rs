use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::warn;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{CatalogEntry, FetchStatus, Frequency, MetadataRow};
use crate::error::FetchError;
use crate::providers::{timestamp, today};
use crate::store::Store;

pub const ATTACH_SOURCE: &str = "LOCAL_ATTACH";
pub const ATTACH_TAG: &str = "local-attach";

#[derive(Debug, Clone, Serialize)]
pub struct AttachReport {
    pub file_name: String,
    pub destination: String,
    pub copied: bool,
    pub error: Option<String>,
}

/// Copies every regular file of `source_dir` into the structural raw
/// directory and registers it. A failed copy is reported and skipped, and a
/// file named like the fetch log is never copied over it.
pub fn attach_directory(
    store: &Store,
    source_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<Vec<AttachReport>, FetchError> {
    if !source_dir.is_dir() {
        return Err(FetchError::AttachDirMissing(
            source_dir.display().to_string(),
        ));
    }
    store.ensure_layout()?;

    let mut files = Vec::new();
    let mut reports = Vec::new();
    let entries = fs::read_dir(source_dir)
        .map_err(|err| FetchError::Filesystem(format!("read {}: {err}", source_dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => files.push((name, path)),
            Err(name) => {
                let file_name = name.to_string_lossy().into_owned();
                warn!(file = %file_name, "skipping attach file with non UTF-8 name");
                reports.push(AttachReport {
                    file_name,
                    destination: String::new(),
                    copied: false,
                    error: Some("file name is not valid UTF-8".to_string()),
                });
            }
        }
    }
    files.sort();

    let metadata_path = store.metadata_path();
    for (file_name, source) in files {
        let destination = store.structural_dir().join(&file_name);
        if destination == metadata_path {
            warn!(file = %file_name, "refusing to attach over the fetch log");
            reports.push(AttachReport {
                file_name,
                destination: destination.to_string(),
                copied: false,
                error: Some(format!("{destination} is the fetch log and cannot be replaced")),
            });
            continue;
        }
        let report = match copy_into_store(&source, &destination) {
            Ok(copied) => {
                register(store, &file_name, &destination)?;
                sink.event(ProgressEvent {
                    message: format!("attach: {file_name} -> {destination}"),
                    elapsed: None,
                });
                AttachReport {
                    file_name,
                    destination: destination.to_string(),
                    copied,
                    error: None,
                }
            }
            Err(err) => {
                warn!(file = %file_name, "failed copying attach file: {err}");
                AttachReport {
                    file_name,
                    destination: destination.to_string(),
                    copied: false,
                    error: Some(err.to_string()),
                }
            }
        };
        reports.push(report);
    }
    Ok(reports)
}

/// Returns `false` when source and destination are already the same file.
fn copy_into_store(source: &Path, destination: &Utf8PathBuf) -> Result<bool, FetchError> {
    if same_file(source, destination.as_std_path()) {
        return Ok(false);
    }
    fs::copy(source, destination.as_std_path())
        .map_err(|err| FetchError::Filesystem(format!("copy {}: {err}", source.display())))?;
    Ok(true)
}

fn same_file(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn register(store: &Store, file_name: &str, destination: &Utf8PathBuf) -> Result<(), FetchError> {
    store.write_metadata_row(&MetadataRow {
        source: ATTACH_SOURCE.to_string(),
        series_id: file_name.to_string(),
        country: String::new(),
        frequency: Frequency::Unknown.to_string(),
        last_fetch: timestamp(),
        status: FetchStatus::Ok,
        filepath: destination.to_string(),
        notes: "attached by user".to_string(),
    })?;
    store.upsert_catalog_entry(CatalogEntry {
        dataset_name: file_name.to_string(),
        category: "structural".to_string(),
        frequency: Frequency::Unknown.to_string(),
        coverage: "attached".to_string(),
        source: ATTACH_TAG.to_string(),
        source_url: String::new(),
        storage_path: store.storage_path(destination),
        refresh_method: ATTACH_TAG.to_string(),
        last_updated: today(),
        notes: "Attached file ingested into canonical repository".to_string(),
    })
}
