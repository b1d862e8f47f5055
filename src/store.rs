use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{CatalogEntry, METADATA_HEADER, MetadataRow};
use crate::error::FetchError;

pub const CATALOG_FILE: &str = "catalog.csv";
pub const METADATA_FILE: &str = "structural_metadata.csv";

/// On-disk layout of the data repository:
///
/// ```text
/// <root>/catalog.csv
/// <root>/raw/macro/
/// <root>/raw/structural/
/// <root>/raw/structural/structural_metadata.csv
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn macro_dir(&self) -> Utf8PathBuf {
        self.root.join("raw").join("macro")
    }

    pub fn structural_dir(&self) -> Utf8PathBuf {
        self.root.join("raw").join("structural")
    }

    pub fn catalog_path(&self) -> Utf8PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn metadata_path(&self) -> Utf8PathBuf {
        self.structural_dir().join(METADATA_FILE)
    }

    pub fn ensure_layout(&self) -> Result<(), FetchError> {
        for dir in [self.macro_dir(), self.structural_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| FetchError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }

    /// Path recorded in the catalog's `storage_path` column: relative to the
    /// directory holding the repository root, so entries stay portable.
    pub fn storage_path(&self, path: &Utf8Path) -> String {
        let base = self.root.parent().filter(|parent| !parent.as_str().is_empty());
        match base.and_then(|base| path.strip_prefix(base).ok()) {
            Some(relative) => relative.as_str().replace('\\', "/"),
            None => path.as_str().replace('\\', "/"),
        }
    }

    /// Appends one row to the fetch log, writing the header when the file is new.
    pub fn write_metadata_row(&self, row: &MetadataRow) -> Result<(), FetchError> {
        let path = self.metadata_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| FetchError::MetadataWrite(err.to_string()))?;
        }
        let is_new = !path.as_std_path().exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| FetchError::MetadataWrite(format!("open {path}: {err}")))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer
                .write_record(METADATA_HEADER)
                .map_err(|err| FetchError::MetadataWrite(err.to_string()))?;
        }
        writer
            .serialize(row)
            .map_err(|err| FetchError::MetadataWrite(err.to_string()))?;
        writer
            .flush()
            .map_err(|err| FetchError::MetadataWrite(err.to_string()))?;
        Ok(())
    }

    pub fn read_metadata(&self) -> Result<Vec<MetadataRow>, FetchError> {
        let path = self.metadata_path();
        if !path.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path.as_std_path())
            .map_err(|err| FetchError::MetadataWrite(err.to_string()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<MetadataRow>, _>>()
            .map_err(|err| FetchError::MetadataWrite(err.to_string()))
    }

    pub fn load_catalog(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        let path = self.catalog_path();
        if !path.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path.as_std_path())
            .map_err(|err| FetchError::CatalogParse(format!("{path}: {err}")))?;
        let mut entries: Vec<CatalogEntry> = Vec::new();
        for record in reader.deserialize() {
            let entry: CatalogEntry =
                record.map_err(|err| FetchError::CatalogParse(format!("{path}: {err}")))?;
            merge_entry(&mut entries, entry);
        }
        Ok(entries)
    }

    /// Inserts or overwrites the entry with the same `dataset_name`, then
    /// rewrites the whole catalog through a temp file in the same directory.
    pub fn upsert_catalog_entry(&self, entry: CatalogEntry) -> Result<(), FetchError> {
        let mut entries = self.load_catalog()?;
        merge_entry(&mut entries, entry);
        self.write_catalog(&entries)
    }

    fn write_catalog(&self, entries: &[CatalogEntry]) -> Result<(), FetchError> {
        let path = self.catalog_path();
        let parent = path
            .parent()
            .ok_or_else(|| FetchError::Filesystem("invalid catalog path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        if entries.is_empty() {
            writer
                .write_record(CATALOG_HEADER)
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        for entry in entries {
            writer
                .serialize(entry)
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;

        let mut temp = Builder::new()
            .prefix(".catalog")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

const CATALOG_HEADER: [&str; 10] = [
    "dataset_name",
    "category",
    "frequency",
    "coverage",
    "source",
    "source_url",
    "storage_path",
    "refresh_method",
    "last_updated",
    "notes",
];

fn merge_entry(entries: &mut Vec<CatalogEntry>, entry: CatalogEntry) {
    match entries
        .iter_mut()
        .find(|existing| existing.dataset_name == entry.dataset_name)
    {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}
