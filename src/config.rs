use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const DEFAULT_CONFIG_FILE: &str = "structural-fetch.json";
pub const DEFAULT_DATA_ROOT: &str = "data_repository";
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PREFLIGHT_TIMEOUT_SECS: u64 = 5;

pub const WORLDBANK_BASE: &str = "https://api.worldbank.org/v2";
pub const ECB_HOSTS: [&str; 2] = [
    "https://sdw-wsrest.ecb.europa.eu/service",
    "https://sdw.ecb.europa.eu/service",
];
pub const IMF_BASE: &str = "https://dataservices.imf.org/REST/SDMX_JSON.svc/CompactData";
pub const BIS_BASE: &str = "https://stats.bis.org";
pub const ECB_SDMX_BASE: &str = "https://data-api.ecb.europa.eu/service";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_root: Option<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub preflight_timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub endpoints: EndpointsEntry,
    #[serde(default)]
    pub sdmx: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub worldbank: Option<String>,
    #[serde(default)]
    pub ecb: Option<Vec<String>>,
    #[serde(default)]
    pub imf: Option<String>,
    #[serde(default)]
    pub bis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub worldbank: String,
    pub ecb: Vec<String>,
    pub imf: String,
    pub bis: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            worldbank: WORLDBANK_BASE.to_string(),
            ecb: ECB_HOSTS.iter().map(|host| host.to_string()).collect(),
            imf: IMF_BASE.to_string(),
            bis: BIS_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_root: Utf8PathBuf,
    pub retries: u32,
    pub timeout: Duration,
    pub preflight_timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub countries: Vec<String>,
    pub endpoints: Endpoints,
    pub sdmx: BTreeMap<String, String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            data_root: Utf8PathBuf::from(DEFAULT_DATA_ROOT),
            retries: DEFAULT_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            preflight_timeout: Duration::from_secs(DEFAULT_PREFLIGHT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            proxy: None,
            countries: default_countries(),
            endpoints: Endpoints::default(),
            sdmx: default_sdmx_endpoints(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `structural-fetch.json` when present. Without an
    /// explicit path a missing file means built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(FetchError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let defaults = ResolvedConfig::default();

        let countries = match config.countries {
            Some(countries) => countries
                .into_iter()
                .map(|country| normalize_country(&country))
                .collect::<Result<Vec<_>, FetchError>>()?,
            None => defaults.countries,
        };

        let endpoints = Endpoints {
            worldbank: config
                .endpoints
                .worldbank
                .unwrap_or(defaults.endpoints.worldbank),
            ecb: config
                .endpoints
                .ecb
                .filter(|hosts| !hosts.is_empty())
                .unwrap_or(defaults.endpoints.ecb),
            imf: config.endpoints.imf.unwrap_or(defaults.endpoints.imf),
            bis: config.endpoints.bis.unwrap_or(defaults.endpoints.bis),
        };

        let proxy = config
            .proxy
            .filter(|value| !value.trim().is_empty())
            .or_else(proxy_from_env);

        Ok(ResolvedConfig {
            data_root: config
                .data_root
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.data_root),
            retries: config.retries.unwrap_or(defaults.retries),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            preflight_timeout: config
                .preflight_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.preflight_timeout),
            user_agent: config.user_agent.unwrap_or(defaults.user_agent),
            proxy,
            countries,
            endpoints,
            sdmx: config.sdmx.unwrap_or(defaults.sdmx),
        })
    }
}

pub fn default_countries() -> Vec<String> {
    ["FRA", "DEU", "ITA", "ESP", "USA", "GBR", "CHE"]
        .iter()
        .map(|code| code.to_string())
        .collect()
}

pub fn default_sdmx_endpoints() -> BTreeMap<String, String> {
    BTreeMap::from([("ECB".to_string(), ECB_SDMX_BASE.to_string())])
}

pub fn default_user_agent() -> String {
    format!("structural-fetch/{}", env!("CARGO_PKG_VERSION"))
}

/// Reads the conventional proxy variables once; nothing is written back.
pub fn proxy_from_env() -> Option<String> {
    ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn normalize_country(value: &str) -> Result<String, FetchError> {
    let normalized = value.trim().to_uppercase();
    if normalized.len() != 3 || !normalized.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(FetchError::ConfigParse(format!(
            "country must be an ISO3 code: {value}"
        )));
    }
    Ok(normalized)
}
