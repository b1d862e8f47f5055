use crate::domain::{CatalogEntry, Frequency, Provider, SeriesDescriptor};
use crate::error::FetchError;
use crate::http::HttpTransport;

use super::{
    FetchContext, SeriesRecord, SeriesReport, fetch_candidates, record_series, refresh_method,
    series_notes, today, try_sdmx,
};

pub const IMF_AGENCY: &str = "IMF";

pub const IMF_SERIES: [SeriesDescriptor; 2] = [
    SeriesDescriptor {
        dataset: "IFS",
        key: "USA.NGDP_R",
        series_id: "IFS:USA.NGDP_R",
        query: "startPeriod=2015",
        frequency: Frequency::Annual,
        coverage: "2015-present",
        notes: "IMF IFS real GDP (CompactData syntax)",
    },
    SeriesDescriptor {
        dataset: "IFS",
        key: "ITA.NGDP_R",
        series_id: "IFS:ITA.NGDP_R",
        query: "startPeriod=2015",
        frequency: Frequency::Annual,
        coverage: "2015-present",
        notes: "IMF IFS real GDP (Italy)",
    },
];

pub fn series_url(base: &str, series: &SeriesDescriptor) -> String {
    let mut url = format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        series.dataset,
        series.key
    );
    if !series.query.is_empty() {
        url.push('?');
        url.push_str(series.query);
    }
    url
}

/// Reference area of a CompactData key (`USA.NGDP_R` -> `USA`).
pub fn key_country(key: &str) -> &str {
    match key.split_once('.') {
        Some((country, _)) => country,
        None => "",
    }
}

pub fn fetch<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    series_list: &[SeriesDescriptor],
) -> Result<Vec<SeriesReport>, FetchError> {
    let base = ctx.config.endpoints.imf.as_str();
    let mut reports = Vec::new();

    for series in series_list {
        let destination = ctx.store.structural_dir().join(series.file_name("imf"));
        ctx.progress(format!("imf: fetching {}", series.resource()));

        let mut result = try_sdmx(ctx, IMF_AGENCY, series, &destination);
        if !result.succeeded() {
            result = result.then(fetch_candidates(
                ctx,
                &[series_url(base, series)],
                &destination,
            ));
        }

        let report = record_series(
            ctx,
            SeriesRecord {
                provider: Provider::Imf,
                series_id: series.series_id,
                country: key_country(series.key),
                frequency: series.frequency,
                notes: series_notes(series.notes, &result),
                destination: &destination,
                result: &result,
            },
        )?;

        if result.succeeded() {
            ctx.store.upsert_catalog_entry(CatalogEntry {
                dataset_name: format!("IMF {}", series.series_id),
                category: "structural".to_string(),
                frequency: series.frequency.to_string(),
                coverage: series.coverage.to_string(),
                source: "IMF SDMX JSON".to_string(),
                source_url: base.trim_end_matches('/').to_string(),
                storage_path: ctx.store.storage_path(&destination),
                refresh_method: refresh_method(Provider::Imf),
                last_updated: today(),
                notes: series.notes.to_string(),
            })?;
        }
        reports.push(report);
    }

    Ok(reports)
}
