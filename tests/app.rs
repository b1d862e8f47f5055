use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use structural_fetch::app::{App, FetchOptions, ProgressEvent, ProgressSink};
use structural_fetch::attach::ATTACH_SOURCE;
use structural_fetch::config::{Endpoints, ResolvedConfig};
use structural_fetch::domain::{FetchStatus, Provider};
use structural_fetch::http::{FetchFailure, Fetcher, HttpTransport, RetryPolicy, Sleeper};
use structural_fetch::output::JsonOutput;
use structural_fetch::providers::FetchRoute;
use structural_fetch::providers::ecb::ECB_SERIES;

const WORLDBANK_BODY: &[u8] =
    br#"[{"page":1,"pages":1,"total":1},[{"date":"2022","value":111.8}]]"#;

/// Answers with the first rule whose pattern occurs in the URL.
#[derive(Default)]
struct RoutedTransport {
    rules: Vec<(&'static str, Result<Vec<u8>, FetchFailure>)>,
    calls: Mutex<Vec<String>>,
}

impl RoutedTransport {
    fn with(mut self, pattern: &'static str, response: Result<Vec<u8>, FetchFailure>) -> Self {
        self.rules.push((pattern, response));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpTransport for RoutedTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        self.rules
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(FetchFailure::retryable("connection refused")))
    }
}

#[derive(Clone, Default)]
struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn test_config(root: &Path, retries: u32) -> ResolvedConfig {
    ResolvedConfig {
        data_root: Utf8PathBuf::from_path_buf(root.join("data_repository")).unwrap(),
        retries,
        timeout: Duration::from_secs(1),
        countries: vec!["FRA".to_string()],
        endpoints: Endpoints {
            worldbank: "http://wb.test/v2".to_string(),
            ecb: vec!["http://ecb.test/service".to_string()],
            imf: "http://imf.test/CompactData".to_string(),
            bis: "http://bis.test".to_string(),
        },
        sdmx: BTreeMap::new(),
        proxy: None,
        ..ResolvedConfig::default()
    }
}

fn build_app(
    transport: RoutedTransport,
    config: ResolvedConfig,
) -> (App<RoutedTransport>, RecordingSleeper) {
    let sleeper = RecordingSleeper::default();
    let fetcher = Fetcher::new(
        transport,
        RetryPolicy::new(config.retries, config.timeout),
    )
    .with_sleeper(sleeper.clone());
    (App::new(fetcher, config), sleeper)
}

fn only(provider: Provider) -> FetchOptions {
    FetchOptions {
        providers: vec![provider],
        attach: None,
        skip_preflight: true,
    }
}

#[test]
fn worldbank_success_writes_artifact_log_and_catalog() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default().with("wb.test", Ok(WORLDBANK_BODY.to_vec()));
    let (app, _sleeper) = build_app(transport, test_config(temp.path(), 1));

    let result = app.fetch(only(Provider::WorldBank), &JsonOutput).unwrap();

    assert_eq!(result.series.len(), 1);
    assert_eq!(result.count(FetchStatus::Ok), 1);
    let report = &result.series[0];
    assert_eq!(report.country.as_deref(), Some("FRA"));
    assert_matches!(&report.route, Some(FetchRoute::Http { url }) if url.contains("/country/FRA/indicator/GC.DOD.TOTL.GD.ZS"));

    let artifact = app.store().macro_dir().join("wb_GC.DOD.TOTL.GD.ZS_FRA.json");
    assert_eq!(std::fs::read(artifact.as_std_path()).unwrap(), WORLDBANK_BODY);

    let rows = app.store().read_metadata().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source, "WorldBank");
    assert_eq!(rows[0].series_id, "GC.DOD.TOTL.GD.ZS");
    assert_eq!(rows[0].country, "FRA");
    assert_eq!(rows[0].status, FetchStatus::Ok);
    assert_eq!(rows[0].filepath, artifact.to_string());

    let catalog = app.catalog().unwrap().entries;
    assert_eq!(catalog.len(), 1);
    assert!(catalog[0].dataset_name.starts_with("World Bank"));
    assert_eq!(catalog[0].category, "macro");
    assert_eq!(catalog[0].notes, "Countries covered: FRA");
    assert_eq!(catalog[0].refresh_method, "structural-fetch fetch --only worldbank");
    assert_eq!(
        catalog[0].storage_path,
        "data_repository/raw/macro/wb_GC.DOD.TOTL.GD.ZS_<ISO>.json"
    );
}

#[test]
fn ecb_timeouts_exhaust_retries_and_log_failures() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default().with(
        "ecb.test",
        Err(FetchFailure::retryable("operation timed out")),
    );
    let (app, sleeper) = build_app(transport, test_config(temp.path(), 2));

    let result = app.fetch(only(Provider::Ecb), &JsonOutput).unwrap();

    assert_eq!(result.series.len(), ECB_SERIES.len());
    assert_eq!(result.count(FetchStatus::Fail), ECB_SERIES.len());
    assert!(result.series.iter().all(|report| report.attempts == 3));
    assert_eq!(sleeper.waits.lock().unwrap().len(), 2 * ECB_SERIES.len());

    let rows = app.store().read_metadata().unwrap();
    assert_eq!(rows.len(), ECB_SERIES.len());
    for (row, series) in rows.iter().zip(ECB_SERIES.iter()) {
        assert_eq!(row.source, "ECB");
        assert_eq!(row.status, FetchStatus::Fail);
        assert!(row.notes.contains(series.notes));
        assert!(row.notes.contains("(last error: operation timed out)"));
        assert_eq!(row.filepath, "operation timed out");
    }
    assert!(app.catalog().unwrap().entries.is_empty());
}

#[test]
fn ecb_prefers_sdmx_when_available() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = test_config(temp.path(), 0);
    config.sdmx = BTreeMap::from([("ECB".to_string(), "http://sdmx.test/service".to_string())]);
    let transport = RoutedTransport::default().with("sdmx.test", Ok(b"{}".to_vec()));
    let (app, _sleeper) = build_app(transport, config);
    let sink = RecordingSink::default();

    let result = app.fetch(only(Provider::Ecb), &sink).unwrap();

    assert_eq!(result.count(FetchStatus::Ok), ECB_SERIES.len());
    for report in &result.series {
        assert_matches!(&report.route, Some(FetchRoute::Sdmx { url }) if url.starts_with("http://sdmx.test/service/data/BSI/"));
    }
    let transport_calls = app_calls(&app);
    assert!(transport_calls.iter().all(|url| url.contains("sdmx.test")));
    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|message| message.starts_with("sdmx: fetched")));
}

#[test]
fn ecb_falls_back_to_direct_host_when_sdmx_fails() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = test_config(temp.path(), 0);
    config.sdmx = BTreeMap::from([("ECB".to_string(), "http://sdmx.test/service".to_string())]);
    let transport = RoutedTransport::default()
        .with(
            "sdmx.test",
            Err(FetchFailure::permanent("HTTP Error 400 Bad Request")),
        )
        .with("ecb.test", Ok(b"{}".to_vec()));
    let (app, _sleeper) = build_app(transport, config);

    let result = app.fetch(only(Provider::Ecb), &JsonOutput).unwrap();

    assert_eq!(result.count(FetchStatus::Ok), ECB_SERIES.len());
    for report in &result.series {
        assert_eq!(report.attempts, 2);
        assert_matches!(&report.route, Some(FetchRoute::Http { url }) if url.starts_with("http://ecb.test/service/data/BSI/"));
    }
    let catalog = app.catalog().unwrap().entries;
    assert_eq!(catalog.len(), ECB_SERIES.len());
    assert!(catalog.iter().all(|entry| entry.dataset_name.starts_with("ECB BSI:")));
}

#[test]
fn bis_404_records_hint_with_tried_urls() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default().with(
        "bis.test",
        Err(FetchFailure::permanent("HTTP Error 404 Not Found")),
    );
    let (app, sleeper) = build_app(transport, test_config(temp.path(), 3));

    let result = app.fetch(only(Provider::Bis), &JsonOutput).unwrap();

    assert_eq!(result.count(FetchStatus::Fail), 2);
    // Permanent failures are not retried: one attempt per candidate URL.
    assert!(result.series.iter().all(|report| report.attempts == 5));
    assert!(sleeper.waits.lock().unwrap().is_empty());

    let rows = app.store().read_metadata().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].source, "BIS/CDIS");
    assert!(rows[0].notes.contains(
        "HTTP 404 on http://bis.test/api/views/LBS_D_PUB/CSV?downloadfilename=LBS_D_PUB.csv"
    ));
    assert!(rows[0].notes.contains("tried: "));
    assert!(rows[0].notes.contains("check BIS view identifier"));
    assert!(!rows[0].notes.contains("(last error:"));
}

#[test]
fn one_failing_series_does_not_abort_the_provider() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default()
        .with("USA.NGDP_R", Ok(b"{\"CompactData\":{}}".to_vec()))
        .with(
            "ITA.NGDP_R",
            Err(FetchFailure::permanent("HTTP Error 403 Forbidden")),
        );
    let (app, _sleeper) = build_app(transport, test_config(temp.path(), 1));

    let result = app.fetch(only(Provider::Imf), &JsonOutput).unwrap();

    let statuses: Vec<_> = result
        .series
        .iter()
        .map(|report| (report.country.clone().unwrap_or_default(), report.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("USA".to_string(), FetchStatus::Ok),
            ("ITA".to_string(), FetchStatus::Fail)
        ]
    );
    let catalog = app.catalog().unwrap().entries;
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].dataset_name, "IMF IFS:USA.NGDP_R");
}

#[test]
fn repeated_runs_append_log_but_keep_one_catalog_entry() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default().with("wb.test", Ok(WORLDBANK_BODY.to_vec()));
    let (app, _sleeper) = build_app(transport, test_config(temp.path(), 0));

    app.fetch(only(Provider::WorldBank), &JsonOutput).unwrap();
    let first = app.catalog().unwrap().entries;
    app.fetch(only(Provider::WorldBank), &JsonOutput).unwrap();
    let second = app.catalog().unwrap().entries;

    assert_eq!(app.store().read_metadata().unwrap().len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].dataset_name, second[0].dataset_name);
    assert_eq!(first[0].storage_path, second[0].storage_path);
    assert_eq!(first[0].notes, second[0].notes);
}

#[test]
fn attach_copies_file_and_registers_it() {
    let temp = tempfile::tempdir().unwrap();
    let incoming = temp.path().join("incoming");
    std::fs::create_dir_all(&incoming).unwrap();
    std::fs::write(incoming.join("foo.csv"), b"Date,Value\n2020-01-01,1.5\n").unwrap();
    let (app, _sleeper) = build_app(RoutedTransport::default(), test_config(temp.path(), 0));

    let result = app.attach(&incoming, &JsonOutput).unwrap();

    assert_eq!(result.attached.len(), 1);
    assert!(result.attached[0].copied);
    let destination = app.store().structural_dir().join("foo.csv");
    assert_eq!(
        std::fs::read(destination.as_std_path()).unwrap(),
        b"Date,Value\n2020-01-01,1.5\n"
    );

    let rows = app.store().read_metadata().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source, ATTACH_SOURCE);
    assert_eq!(rows[0].series_id, "foo.csv");
    assert_eq!(rows[0].status, FetchStatus::Ok);

    let catalog = app.catalog().unwrap().entries;
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].dataset_name, "foo.csv");
    assert_eq!(catalog[0].source, "local-attach");
    assert!(app_calls(&app).is_empty());
}

#[test]
fn fetch_continues_when_attach_directory_is_missing() {
    let temp = tempfile::tempdir().unwrap();
    let transport = RoutedTransport::default().with("wb.test", Ok(WORLDBANK_BODY.to_vec()));
    let (app, _sleeper) = build_app(transport, test_config(temp.path(), 0));
    let options = FetchOptions {
        attach: Some(temp.path().join("missing")),
        ..only(Provider::WorldBank)
    };

    let result = app.fetch(options, &JsonOutput).unwrap();

    assert!(result.attached.is_empty());
    assert_eq!(result.count(FetchStatus::Ok), 1);
}

fn app_calls(app: &App<RoutedTransport>) -> Vec<String> {
    app.fetcher().transport().calls()
}
