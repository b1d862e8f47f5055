use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{
    AttachResult, CatalogResult, FetchResult, PreflightReport, ProgressEvent, ProgressSink,
};
use crate::attach::AttachReport;
use crate::compare::CompareResult;
use crate::domain::FetchStatus;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_attach(result: &AttachResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_preflight(report: &PreflightReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_catalog(result: &CatalogResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_compare(result: &CompareResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the tracing subscriber and prints coloured summaries.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => info!("{}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_fetch(result: &FetchResult) {
        println!("{CYAN}Fetch summary{RESET}");
        println!(
            "{GREEN}OK: {}{RESET}  {RED}FAIL: {}{RESET}  {CYAN}attached: {}{RESET}",
            result.count(FetchStatus::Ok),
            result.count(FetchStatus::Fail),
            result.attached.len()
        );
        for probe in &result.preflight {
            if !probe.dns_ok || !probe.tcp_ok {
                println!(
                    "{YELLOW}preflight {} ({}): dns={} tcp={}{RESET}",
                    probe.provider, probe.host, probe.dns_ok, probe.tcp_ok
                );
            }
        }
        for series in &result.series {
            let country = series.country.as_deref().unwrap_or("");
            match series.status {
                FetchStatus::Ok => println!(
                    "{GREEN}{} {} {} OK {}{RESET}",
                    series.provider,
                    series.series_id,
                    country,
                    series.path.as_deref().unwrap_or("")
                ),
                FetchStatus::Fail => println!(
                    "{RED}{} {} {} FAIL {}{RESET}",
                    series.provider,
                    series.series_id,
                    country,
                    series.error.as_deref().unwrap_or("")
                ),
            }
        }
        Self::print_attached(&result.attached);
        println!("Done. See {}", result.metadata_path);
    }

    pub fn print_attach(result: &AttachResult) {
        println!("{CYAN}Attached files{RESET}");
        Self::print_attached(&result.attached);
        println!("Done. See {}", result.metadata_path);
    }

    fn print_attached(attached: &[AttachReport]) {
        for report in attached {
            match &report.error {
                None => println!(
                    "{GREEN}attached {} -> {}{RESET}",
                    report.file_name, report.destination
                ),
                Some(err) => println!("{RED}attach failed {}: {err}{RESET}", report.file_name),
            }
        }
    }

    pub fn print_preflight(report: &PreflightReport) {
        for result in &report.results {
            let color = if result.dns_ok && result.tcp_ok { GREEN } else { YELLOW };
            println!(
                "{color}{:<10} {:<28} dns={:<5} tcp={:<5} {}{RESET}",
                result.provider.as_str(),
                result.host,
                result.dns_ok,
                result.tcp_ok,
                result.resolved_address.as_deref().unwrap_or("-")
            );
        }
    }

    pub fn print_catalog(result: &CatalogResult) {
        println!("{CYAN}{} ({} entries){RESET}", result.path, result.entries.len());
        for entry in &result.entries {
            println!(
                "{:<48} {:<10} {:<10} {}",
                entry.dataset_name, entry.category, entry.frequency, entry.last_updated
            );
        }
    }

    pub fn print_compare(result: &CompareResult) {
        for file in &result.files {
            let color = if file.matched { GREEN } else { RED };
            println!(
                "{color}{} {:?} ({} rows){RESET}",
                file.file, file.status, file.rows_original
            );
        }
        println!("Total files checked: {}", result.total);
        println!("Exact matches:       {}", result.exact_matches);
        println!("Mismatches:          {}", result.mismatches);
        if result.all_match() {
            println!("{GREEN}All files match exactly{RESET}");
        } else {
            println!("{YELLOW}Some files have differences{RESET}");
        }
    }
}
