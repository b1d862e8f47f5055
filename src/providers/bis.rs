use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::domain::{CatalogEntry, Frequency, Provider};
use crate::error::FetchError;
use crate::http::HttpTransport;

use super::{
    CandidateResult, FetchContext, SeriesRecord, SeriesReport, fetch_candidates, record_series,
    refresh_method, series_notes, today,
};

static NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b404\b").expect("404 pattern is valid"));

#[derive(Debug, Clone, Copy)]
pub struct BisDownload {
    pub series_id: &'static str,
    pub view: &'static str,
    pub file_name: &'static str,
    pub frequency: Frequency,
    pub notes: &'static str,
}

pub const BIS_DOWNLOADS: [BisDownload; 2] = [
    BisDownload {
        series_id: "BIS:LBS_D_PUB",
        view: "LBS_D_PUB",
        file_name: "bis_lbs_d_pub.csv",
        frequency: Frequency::Quarterly,
        notes: "BIS Locational Banking Statistics (public CSV)",
    },
    BisDownload {
        series_id: "CDIS:CDIS_D_PUB",
        view: "CDIS_D_PUB",
        file_name: "bis_cdis_d_pub.csv",
        frequency: Frequency::Annual,
        notes: "IMF/BIS Coordinated Direct Investment Survey (public CSV)",
    },
];

impl BisDownload {
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/api/views/{}/CSV?downloadfilename={}.csv",
            base.trim_end_matches('/'),
            self.view,
            self.view
        )
    }

    pub fn dataset_name(&self) -> String {
        self.series_id.replace(':', " ")
    }
}

/// Canonical URL followed by shape permutations seen to work when the public
/// view endpoint answers 404. Not a contract of the BIS API.
pub fn candidate_urls(url: &str) -> Vec<String> {
    let mut candidates = vec![url.to_string()];
    if url.contains("api/views") {
        let base = url.split('?').next().unwrap_or(url).trim_end_matches('/');
        candidates.push(base.to_string());
        candidates.push(format!("{}/csv", base.replace("/api/views/", "/views/")));
        candidates.push(format!("{base}/CSV"));
        candidates.push(format!("{base}/csv"));
    }
    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

fn not_found_notes(notes: &str, result: &CandidateResult) -> Option<String> {
    let error = result.last_error.as_deref()?;
    if result.succeeded() || !NOT_FOUND.is_match(error) {
        return None;
    }
    let first = result.tried.first().map(String::as_str).unwrap_or_default();
    Some(format!(
        "{notes} (HTTP 404 on {first}; tried: {}; check BIS view identifier or the public download URL)",
        result.tried.join(", ")
    ))
}

pub fn fetch<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    downloads: &[BisDownload],
) -> Result<Vec<SeriesReport>, FetchError> {
    let base = ctx.config.endpoints.bis.as_str();
    let mut reports = Vec::new();

    for item in downloads {
        let destination = ctx.store.structural_dir().join(item.file_name);
        let url = item.url(base);
        ctx.progress(format!("bis: fetching {}", item.file_name));

        let result = fetch_candidates(ctx, &candidate_urls(&url), &destination);
        let notes = match not_found_notes(item.notes, &result) {
            Some(hint) => {
                warn!(
                    series = item.series_id,
                    "received 404; verify the view id or the API URL on https://stats.bis.org/"
                );
                hint
            }
            None => series_notes(item.notes, &result),
        };

        let report = record_series(
            ctx,
            SeriesRecord {
                provider: Provider::Bis,
                series_id: item.series_id,
                country: "",
                frequency: item.frequency,
                notes,
                destination: &destination,
                result: &result,
            },
        )?;

        if result.succeeded() {
            ctx.store.upsert_catalog_entry(CatalogEntry {
                dataset_name: item.dataset_name(),
                category: "structural".to_string(),
                frequency: item.frequency.to_string(),
                coverage: "Provider default".to_string(),
                source: "BIS Statistics API".to_string(),
                source_url: url.clone(),
                storage_path: ctx.store.storage_path(&destination),
                refresh_method: refresh_method(Provider::Bis),
                last_updated: today(),
                notes: item.notes.to_string(),
            })?;
        }
        reports.push(report);
    }

    Ok(reports)
}
