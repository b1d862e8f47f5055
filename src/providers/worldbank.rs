use crate::domain::{CatalogEntry, Frequency, Provider};
use crate::error::FetchError;
use crate::http::HttpTransport;

use super::{
    FetchContext, SeriesRecord, SeriesReport, fetch_candidates, record_series, refresh_method,
    series_notes, today,
};

#[derive(Debug, Clone, Copy)]
pub struct WorldBankIndicator {
    pub code: &'static str,
    pub dataset_name: &'static str,
    pub frequency: Frequency,
    pub coverage: &'static str,
    pub notes: &'static str,
}

pub const WORLDBANK_INDICATORS: [WorldBankIndicator; 1] = [WorldBankIndicator {
    code: "GC.DOD.TOTL.GD.ZS",
    dataset_name: "World Bank General Government Debt (% GDP)",
    frequency: Frequency::Annual,
    coverage: "1990-present (country-dependent)",
    notes: "general government gross debt % GDP",
}];

pub fn indicator_url(base: &str, country: &str, indicator: &str) -> String {
    format!(
        "{}/country/{country}/indicator/{indicator}?format=json&per_page=2000",
        base.trim_end_matches('/')
    )
}

pub fn file_name(indicator: &str, country: &str) -> String {
    format!("wb_{indicator}_{country}.json")
}

/// One request per country and indicator; the catalog gets a single entry
/// per indicator listing the countries fetched in this run.
pub fn fetch<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    indicators: &[WorldBankIndicator],
) -> Result<Vec<SeriesReport>, FetchError> {
    let base = ctx.config.endpoints.worldbank.as_str();
    let mut reports = Vec::new();

    for indicator in indicators {
        let mut covered = Vec::new();
        for country in &ctx.config.countries {
            ctx.progress(format!("worldbank: fetching {} for {country}", indicator.code));
            let url = indicator_url(base, country, indicator.code);
            let destination = ctx.store.macro_dir().join(file_name(indicator.code, country));
            let result = fetch_candidates(ctx, &[url], &destination);
            if result.succeeded() {
                covered.push(country.clone());
            }
            reports.push(record_series(
                ctx,
                SeriesRecord {
                    provider: Provider::WorldBank,
                    series_id: indicator.code,
                    country,
                    frequency: indicator.frequency,
                    notes: series_notes(indicator.notes, &result),
                    destination: &destination,
                    result: &result,
                },
            )?);
        }

        if covered.is_empty() {
            continue;
        }
        let storage_pattern = ctx
            .store
            .macro_dir()
            .join(file_name(indicator.code, "<ISO>"));
        ctx.store.upsert_catalog_entry(CatalogEntry {
            dataset_name: indicator.dataset_name.to_string(),
            category: "macro".to_string(),
            frequency: indicator.frequency.to_string(),
            coverage: indicator.coverage.to_string(),
            source: "World Bank WDI via API".to_string(),
            source_url: format!(
                "{}/country/{{ISO}}/indicator/{}",
                base.trim_end_matches('/'),
                indicator.code
            ),
            storage_path: ctx.store.storage_path(&storage_pattern),
            refresh_method: refresh_method(Provider::WorldBank),
            last_updated: today(),
            notes: format!("Countries covered: {}", covered.join(", ")),
        })?;
    }

    Ok(reports)
}
