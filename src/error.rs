use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    #[error("config file not found at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid proxy setting: {0}")]
    InvalidProxy(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("catalog file is malformed: {0}")]
    CatalogParse(String),

    #[error("failed to write metadata log: {0}")]
    MetadataWrite(String),

    #[error("attach directory not found: {0}")]
    AttachDirMissing(String),

    #[error("failed to read snapshot {path}: {message}")]
    SnapshotRead { path: String, message: String },
}
