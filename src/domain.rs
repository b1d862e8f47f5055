use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    WorldBank,
    Ecb,
    Imf,
    Bis,
}

impl Provider {
    /// Fixed run order of the fetch pipeline.
    pub const ALL: [Provider; 4] = [
        Provider::WorldBank,
        Provider::Ecb,
        Provider::Imf,
        Provider::Bis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::WorldBank => "worldbank",
            Provider::Ecb => "ecb",
            Provider::Imf => "imf",
            Provider::Bis => "bis",
        }
    }

    /// Value written to the `source` column of the metadata log.
    pub fn metadata_source(&self) -> &'static str {
        match self {
            Provider::WorldBank => "WorldBank",
            Provider::Ecb => "ECB",
            Provider::Imf => "IMF",
            Provider::Bis => "BIS/CDIS",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "worldbank" | "wb" => Ok(Provider::WorldBank),
            "ecb" => Ok(Provider::Ecb),
            "imf" => Ok(Provider::Imf),
            "bis" => Ok(Provider::Bis),
            _ => Err(FetchError::InvalidProvider(value.to_string())),
        }
    }
}

/// Parses a comma-separated provider list, keeping the pipeline order and
/// dropping duplicates and empty items.
pub fn parse_provider_list(value: &str) -> Result<Vec<Provider>, FetchError> {
    let mut selected = Vec::new();
    for item in value.split(',').filter(|item| !item.trim().is_empty()) {
        let provider: Provider = item.parse()?;
        if !selected.contains(&provider) {
            selected.push(provider);
        }
    }
    selected.sort();
    Ok(selected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Ok => "OK",
            FetchStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Annual,
    Quarterly,
    Monthly,
    Unknown,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Annual => write!(f, "annual"),
            Frequency::Quarterly => write!(f, "quarterly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Unknown => write!(f, "unknown"),
        }
    }
}

/// Static description of one requestable SDMX series.
#[derive(Debug, Clone, Copy)]
pub struct SeriesDescriptor {
    pub dataset: &'static str,
    pub key: &'static str,
    pub series_id: &'static str,
    pub query: &'static str,
    pub frequency: Frequency,
    pub coverage: &'static str,
    pub notes: &'static str,
}

impl SeriesDescriptor {
    pub fn resource(&self) -> String {
        format!("{}/{}", self.dataset, self.key)
    }

    /// Deterministic raw-artifact name, e.g. `ecb_M_U2_N_A.json`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}.json", sanitize_key(self.key))
    }
}

pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// One row of the append-only fetch log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub source: String,
    pub series_id: String,
    pub country: String,
    pub frequency: String,
    pub last_fetch: String,
    pub status: FetchStatus,
    pub filepath: String,
    pub notes: String,
}

pub const METADATA_HEADER: [&str; 8] = [
    "source",
    "series_id",
    "country",
    "frequency",
    "last_fetch",
    "status",
    "filepath",
    "notes",
];

/// One row of the dataset catalog, keyed by `dataset_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub dataset_name: String,
    pub category: String,
    pub frequency: String,
    pub coverage: String,
    pub source: String,
    pub source_url: String,
    pub storage_path: String,
    pub refresh_method: String,
    pub last_updated: String,
    pub notes: String,
}
