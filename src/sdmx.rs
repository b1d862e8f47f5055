use std::collections::BTreeMap;

use serde::Serialize;

/// Whether an alternate SDMX REST path exists for an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "capability", rename_all = "lowercase")]
pub enum SdmxCapability {
    Available { url: String },
    Unavailable { reason: String },
}

/// Agency code to SDMX 2.1 REST base URL, e.g. `ECB -> https://data-api.ecb.europa.eu/service`.
#[derive(Debug, Clone, Default)]
pub struct SdmxRegistry {
    endpoints: BTreeMap<String, String>,
}

impl SdmxRegistry {
    pub fn new(endpoints: BTreeMap<String, String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|(agency, base)| (agency.to_uppercase(), base.trim_end_matches('/').to_string()))
            .filter(|(_, base)| !base.is_empty())
            .collect();
        Self { endpoints }
    }

    /// Configured REST base for an agency, trailing slash removed.
    pub fn base(&self, agency: &str) -> Option<&str> {
        self.endpoints.get(&agency.to_uppercase()).map(String::as_str)
    }

    pub fn resolve(&self, agency: &str, dataset: &str, key: &str) -> SdmxCapability {
        match self.endpoints.get(&agency.to_uppercase()) {
            Some(base) => SdmxCapability::Available {
                url: format!("{base}/data/{dataset}/{key}?format=jsondata&detail=dataonly"),
            },
            None => SdmxCapability::Unavailable {
                reason: format!("no SDMX endpoint configured for {agency}"),
            },
        }
    }
}
