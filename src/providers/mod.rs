//! Provider adapters. Each adapter owns a static list of series, derives
//! candidate URLs and file names for them, and records one metadata row per
//! series plus catalog upserts on success.

pub mod bis;
pub mod ecb;
pub mod imf;
pub mod worldbank;

use camino::Utf8Path;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::ResolvedConfig;
use crate::domain::{FetchStatus, Frequency, MetadataRow, Provider, SeriesDescriptor};
use crate::error::FetchError;
use crate::http::{Fetcher, HttpTransport};
use crate::sdmx::{SdmxCapability, SdmxRegistry};
use crate::store::Store;

pub struct FetchContext<'a, T: HttpTransport> {
    pub fetcher: &'a Fetcher<T>,
    pub store: &'a Store,
    pub sdmx: &'a SdmxRegistry,
    pub config: &'a ResolvedConfig,
    pub sink: &'a dyn ProgressSink,
}

impl<T: HttpTransport> FetchContext<'_, T> {
    pub(crate) fn progress(&self, message: String) {
        self.sink.event(ProgressEvent {
            message,
            elapsed: None,
        });
    }
}

pub fn fetch_provider<T: HttpTransport>(
    provider: Provider,
    ctx: &FetchContext<'_, T>,
) -> Result<Vec<SeriesReport>, FetchError> {
    match provider {
        Provider::WorldBank => worldbank::fetch(ctx, &worldbank::WORLDBANK_INDICATORS),
        Provider::Ecb => ecb::fetch(ctx, &ecb::ECB_SERIES),
        Provider::Imf => imf::fetch(ctx, &imf::IMF_SERIES),
        Provider::Bis => bis::fetch(ctx, &bis::BIS_DOWNLOADS),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "lowercase")]
pub enum FetchRoute {
    Sdmx { url: String },
    Http { url: String },
}

/// Result of one series, mirrored by exactly one metadata row.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub provider: Provider,
    pub series_id: String,
    pub country: Option<String>,
    pub status: FetchStatus,
    pub path: Option<String>,
    pub route: Option<FetchRoute>,
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateResult {
    pub route: Option<FetchRoute>,
    pub attempts: u32,
    pub tried: Vec<String>,
    pub last_error: Option<String>,
}

impl CandidateResult {
    pub fn succeeded(&self) -> bool {
        self.route.is_some()
    }

    /// Appends a fallback run made after this one failed.
    pub fn then(mut self, fallback: CandidateResult) -> CandidateResult {
        self.attempts += fallback.attempts;
        self.tried.extend(fallback.tried);
        self.route = fallback.route;
        if fallback.last_error.is_some() {
            self.last_error = fallback.last_error;
        }
        self
    }
}

/// Tries each URL in order and stops at the first success.
pub(crate) fn fetch_candidates<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    candidates: &[String],
    destination: &Utf8Path,
) -> CandidateResult {
    let mut result = CandidateResult::default();
    for url in candidates {
        result.tried.push(url.clone());
        let outcome = ctx.fetcher.fetch_url(url, destination.as_std_path());
        result.attempts += outcome.attempts;
        if outcome.success {
            ctx.progress(format!(
                "fetched {url} -> {destination} ({} bytes)",
                outcome.byte_count
            ));
            result.route = Some(FetchRoute::Http { url: url.clone() });
            return result;
        }
        result.last_error = outcome.error_message().map(|message| message.to_string());
    }
    result
}

/// Alternate SDMX path, attempted only when the registry reports it available.
pub(crate) fn try_sdmx<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    agency: &str,
    series: &SeriesDescriptor,
    destination: &Utf8Path,
) -> CandidateResult {
    let mut result = CandidateResult::default();
    match ctx.sdmx.resolve(agency, series.dataset, series.key) {
        SdmxCapability::Unavailable { reason } => {
            ctx.progress(format!("sdmx: skipped for {} ({reason})", series.series_id));
        }
        SdmxCapability::Available { url } => {
            result.tried.push(url.clone());
            let outcome = ctx.fetcher.fetch_url(&url, destination.as_std_path());
            result.attempts = outcome.attempts;
            if outcome.success {
                ctx.progress(format!("sdmx: fetched {} via {url}", series.series_id));
                result.route = Some(FetchRoute::Sdmx { url });
            } else {
                let message = outcome.error_message().unwrap_or("unknown error");
                ctx.progress(format!(
                    "sdmx: failed for {} ({message}); falling back to direct URLs",
                    series.series_id
                ));
                result.last_error = Some(message.to_string());
            }
        }
    }
    result
}

pub(crate) struct SeriesRecord<'r> {
    pub provider: Provider,
    pub series_id: &'r str,
    pub country: &'r str,
    pub frequency: Frequency,
    pub notes: String,
    pub destination: &'r Utf8Path,
    pub result: &'r CandidateResult,
}

/// Writes the metadata row for a finished series and returns its report.
pub(crate) fn record_series<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    record: SeriesRecord<'_>,
) -> Result<SeriesReport, FetchError> {
    let SeriesRecord {
        provider,
        series_id,
        country,
        frequency,
        notes,
        destination,
        result,
    } = record;

    let status = if result.succeeded() {
        FetchStatus::Ok
    } else {
        FetchStatus::Fail
    };
    let error = (!result.succeeded()).then(|| {
        result
            .last_error
            .clone()
            .unwrap_or_else(|| "not attempted".to_string())
    });
    let filepath = match &error {
        None => destination.to_string(),
        Some(message) => message.clone(),
    };

    ctx.store.write_metadata_row(&MetadataRow {
        source: provider.metadata_source().to_string(),
        series_id: series_id.to_string(),
        country: country.to_string(),
        frequency: frequency.to_string(),
        last_fetch: timestamp(),
        status,
        filepath,
        notes,
    })?;

    ctx.progress(format!("{provider}: {series_id} {status}"));

    Ok(SeriesReport {
        provider,
        series_id: series_id.to_string(),
        country: (!country.is_empty()).then(|| country.to_string()),
        status,
        path: result.succeeded().then(|| destination.to_string()),
        route: result.route.clone(),
        attempts: result.attempts,
        error,
    })
}

pub(crate) fn series_notes(notes: &str, result: &CandidateResult) -> String {
    match (&result.route, &result.last_error) {
        (None, Some(error)) => format!("{notes} (last error: {error})"),
        _ => notes.to_string(),
    }
}

pub(crate) fn refresh_method(provider: Provider) -> String {
    format!("structural-fetch fetch --only {provider}")
}

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}
