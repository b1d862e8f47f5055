use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::attach::{AttachReport, attach_directory};
use crate::config::ResolvedConfig;
use crate::domain::{CatalogEntry, FetchStatus, Provider};
use crate::error::FetchError;
use crate::http::{Fetcher, HttpTransport, ReqwestTransport, RetryPolicy};
use crate::preflight::{PreflightResult, run_preflight};
use crate::providers::{FetchContext, SeriesReport, fetch_provider, timestamp};
use crate::sdmx::SdmxRegistry;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub providers: Vec<Provider>,
    pub attach: Option<PathBuf>,
    pub skip_preflight: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            providers: Provider::ALL.to_vec(),
            attach: None,
            skip_preflight: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub started_at: String,
    pub preflight: Vec<PreflightResult>,
    pub attached: Vec<AttachReport>,
    pub series: Vec<SeriesReport>,
    pub metadata_path: String,
    pub catalog_path: String,
}

impl FetchResult {
    pub fn count(&self, status: FetchStatus) -> usize {
        self.series
            .iter()
            .filter(|series| series.status == status)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachResult {
    pub attached: Vec<AttachReport>,
    pub metadata_path: String,
    pub catalog_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub results: Vec<PreflightResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResult {
    pub path: String,
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<T: HttpTransport> {
    store: Store,
    fetcher: Fetcher<T>,
    sdmx: SdmxRegistry,
    config: ResolvedConfig,
}

impl App<ReqwestTransport> {
    pub fn from_config(config: ResolvedConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(&config.user_agent, config.proxy.as_deref())?;
        let fetcher = Fetcher::new(transport, RetryPolicy::new(config.retries, config.timeout));
        Ok(Self::new(fetcher, config))
    }
}

impl<T: HttpTransport> App<T> {
    pub fn new(fetcher: Fetcher<T>, config: ResolvedConfig) -> Self {
        Self {
            store: Store::new(config.data_root.clone()),
            sdmx: SdmxRegistry::new(config.sdmx.clone()),
            fetcher,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    pub fn fetch(
        &self,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let started_at = timestamp();
        sink.event(ProgressEvent {
            message: format!("fetch started at {started_at}"),
            elapsed: None,
        });
        self.store.ensure_layout()?;

        let mut providers = options.providers.clone();
        providers.sort();
        providers.dedup();

        let preflight = if options.skip_preflight {
            Vec::new()
        } else {
            self.preflight(&providers, sink).results
        };

        let attached = match options.attach.as_deref() {
            Some(dir) => match attach_directory(&self.store, dir, sink) {
                Ok(reports) => reports,
                Err(FetchError::AttachDirMissing(dir)) => {
                    warn!(dir = %dir, "attach directory not found; continuing with fetch");
                    Vec::new()
                }
                Err(err) => return Err(err),
            },
            None => Vec::new(),
        };

        let ctx = FetchContext {
            fetcher: &self.fetcher,
            store: &self.store,
            sdmx: &self.sdmx,
            config: &self.config,
            sink,
        };
        let mut series = Vec::new();
        for provider in providers {
            let start = Instant::now();
            let reports = fetch_provider(provider, &ctx)?;
            let ok = reports
                .iter()
                .filter(|report| report.status == FetchStatus::Ok)
                .count();
            sink.event(ProgressEvent {
                message: format!("{provider}: {ok}/{} series fetched", reports.len()),
                elapsed: Some(start.elapsed()),
            });
            series.extend(reports);
        }

        Ok(FetchResult {
            started_at,
            preflight,
            attached,
            series,
            metadata_path: self.store.metadata_path().to_string(),
            catalog_path: self.store.catalog_path().to_string(),
        })
    }

    pub fn attach(&self, dir: &Path, sink: &dyn ProgressSink) -> Result<AttachResult, FetchError> {
        let attached = attach_directory(&self.store, dir, sink)?;
        Ok(AttachResult {
            attached,
            metadata_path: self.store.metadata_path().to_string(),
            catalog_path: self.store.catalog_path().to_string(),
        })
    }

    pub fn preflight(&self, providers: &[Provider], sink: &dyn ProgressSink) -> PreflightReport {
        sink.event(ProgressEvent {
            message: "preflight: checking DNS and TCP reachability".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let results = run_preflight(
            providers,
            &self.config.endpoints,
            &self.sdmx,
            self.config.preflight_timeout,
        );
        sink.event(ProgressEvent {
            message: format!("preflight: {} host(s) probed", results.len()),
            elapsed: Some(start.elapsed()),
        });
        PreflightReport { results }
    }

    pub fn catalog(&self) -> Result<CatalogResult, FetchError> {
        Ok(CatalogResult {
            path: self.store.catalog_path().to_string(),
            entries: self.store.load_catalog()?,
        })
    }
}
