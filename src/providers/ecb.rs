use crate::domain::{CatalogEntry, Frequency, Provider, SeriesDescriptor};
use crate::error::FetchError;
use crate::http::HttpTransport;

use super::{
    FetchContext, SeriesRecord, SeriesReport, fetch_candidates, record_series, refresh_method,
    series_notes, today, try_sdmx,
};

pub const ECB_AGENCY: &str = "ECB";

pub const ECB_SERIES: [SeriesDescriptor; 2] = [
    SeriesDescriptor {
        dataset: "BSI",
        key: "M.U2.N.A.A20.A.1.U2.3000.Z01.E",
        series_id: "BSI:M.U2.N.A.A20.A.1.U2.3000.Z01.E",
        query: "detail=dataonly&startPeriod=2018-01&format=sdmx-json",
        frequency: Frequency::Monthly,
        coverage: "2018-01-present",
        notes: "ECB BSI - Loans to NFCs (Euro area), SDMX guideline syntax",
    },
    SeriesDescriptor {
        dataset: "BSI",
        key: "M.U2.N.A.A20.A.1.U2.1000.Z01.E",
        series_id: "BSI:M.U2.N.A.A20.A.1.U2.1000.Z01.E",
        query: "detail=dataonly&startPeriod=2018-01&format=sdmx-json",
        frequency: Frequency::Monthly,
        coverage: "2018-01-present",
        notes: "ECB BSI - Loans to households (Euro area)",
    },
];

pub fn series_url(host: &str, series: &SeriesDescriptor) -> String {
    let mut url = format!(
        "{}/data/{}/{}",
        host.trim_end_matches('/'),
        series.dataset,
        series.key
    );
    if !series.query.is_empty() {
        url.push('?');
        url.push_str(series.query);
    }
    url
}

/// SDMX path first when available, then every configured SDW host in order.
pub fn fetch<T: HttpTransport>(
    ctx: &FetchContext<'_, T>,
    series_list: &[SeriesDescriptor],
) -> Result<Vec<SeriesReport>, FetchError> {
    let hosts = &ctx.config.endpoints.ecb;
    let mut reports = Vec::new();

    for series in series_list {
        let destination = ctx.store.structural_dir().join(series.file_name("ecb"));
        ctx.progress(format!("ecb: fetching {}", series.resource()));

        let mut result = try_sdmx(ctx, ECB_AGENCY, series, &destination);
        if !result.succeeded() {
            let candidates: Vec<String> =
                hosts.iter().map(|host| series_url(host, series)).collect();
            result = result.then(fetch_candidates(ctx, &candidates, &destination));
        }

        let report = record_series(
            ctx,
            SeriesRecord {
                provider: Provider::Ecb,
                series_id: series.series_id,
                country: "",
                frequency: series.frequency,
                notes: series_notes(series.notes, &result),
                destination: &destination,
                result: &result,
            },
        )?;

        if result.succeeded() {
            ctx.store.upsert_catalog_entry(CatalogEntry {
                dataset_name: format!("ECB {}", series.series_id),
                category: "structural".to_string(),
                frequency: series.frequency.to_string(),
                coverage: series.coverage.to_string(),
                source: "ECB SDW REST".to_string(),
                source_url: hosts
                    .first()
                    .map(|host| format!("{}/data/{}", host.trim_end_matches('/'), series.dataset))
                    .unwrap_or_default(),
                storage_path: ctx.store.storage_path(&destination),
                refresh_method: refresh_method(Provider::Ecb),
                last_updated: today(),
                notes: series.notes.to_string(),
            })?;
        }
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_sdw_url() {
        let url = series_url("https://sdw-wsrest.ecb.europa.eu/service/", &ECB_SERIES[0]);
        assert_eq!(
            url,
            "https://sdw-wsrest.ecb.europa.eu/service/data/BSI/M.U2.N.A.A20.A.1.U2.3000.Z01.E?detail=dataonly&startPeriod=2018-01&format=sdmx-json"
        );
        assert_eq!(
            ECB_SERIES[0].file_name("ecb"),
            "ecb_M_U2_N_A_A20_A_1_U2_3000_Z01_E.json"
        );
    }
}
