use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use structural_fetch::app::{App, FetchOptions, ProgressSink};
use structural_fetch::compare::{compare_snapshots, write_summary};
use structural_fetch::config::{ConfigLoader, ResolvedConfig};
use structural_fetch::domain::{Provider, parse_provider_list};
use structural_fetch::error::FetchError;
use structural_fetch::http::{FetchFailure, Fetcher, HttpTransport, RetryPolicy};
use structural_fetch::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "structural-fetch")]
#[command(about = "Fetch World Bank, ECB, IMF and BIS series into a local raw-data repository")]
#[command(version)]
struct Cli {
    /// Print the structured result as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Path to a JSON config file (default: ./structural-fetch.json if present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Fetch provider series (default command)")]
    Fetch(FetchArgs),
    #[command(about = "Copy local files into the repository and register them")]
    Attach(AttachArgs),
    #[command(about = "Check DNS and TCP reachability of provider hosts")]
    Preflight(PreflightArgs),
    #[command(about = "List catalog entries")]
    Catalog,
    #[command(about = "Compare an original data folder against a trial copy")]
    Compare(CompareArgs),
}

#[derive(Args, Default)]
struct FetchArgs {
    /// Comma-separated providers (worldbank,ecb,imf,bis).
    #[arg(long)]
    only: Option<String>,

    /// Also attach every file of this directory.
    #[arg(long)]
    attach: Option<PathBuf>,

    /// Proxy URL for this run, e.g. http://host:port.
    #[arg(long)]
    proxy: Option<String>,

    #[arg(long)]
    skip_preflight: bool,
}

#[derive(Args)]
struct AttachArgs {
    dir: PathBuf,
}

#[derive(Args)]
struct PreflightArgs {
    #[arg(long)]
    only: Option<String>,
}

#[derive(Args)]
struct CompareArgs {
    #[arg(long)]
    original: PathBuf,

    #[arg(long)]
    trial: PathBuf,

    /// File to compare; repeatable. Defaults to every CSV in --original.
    #[arg(long = "file")]
    files: Vec<String>,

    /// Write a summary CSV here.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::MissingConfig(_)
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_)
        | FetchError::InvalidProxy(_)
        | FetchError::InvalidProvider(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let command = cli
        .command
        .unwrap_or_else(|| Command::Fetch(FetchArgs::default()));

    let load_config = || ConfigLoader::resolve(cli.config.as_deref());
    match command {
        Command::Fetch(args) => {
            let mut config = load_config()?;
            if let Some(proxy) = args.proxy.filter(|value| !value.trim().is_empty()) {
                config.proxy = Some(proxy);
            }
            let app = App::from_config(config)?;
            let options = FetchOptions {
                providers: selected_providers(args.only.as_deref())?,
                attach: args.attach,
                skip_preflight: args.skip_preflight,
            };
            let result = app.fetch(options, sink(mode))?;
            match mode {
                OutputMode::Json => JsonOutput::print_fetch(&result).into_diagnostic()?,
                OutputMode::Console => ConsoleOutput::print_fetch(&result),
            }
        }
        Command::Attach(args) => {
            let result = offline_app(load_config()?).attach(&args.dir, sink(mode))?;
            match mode {
                OutputMode::Json => JsonOutput::print_attach(&result).into_diagnostic()?,
                OutputMode::Console => ConsoleOutput::print_attach(&result),
            }
        }
        Command::Preflight(args) => {
            let providers = selected_providers(args.only.as_deref())?;
            let report = offline_app(load_config()?).preflight(&providers, sink(mode));
            match mode {
                OutputMode::Json => JsonOutput::print_preflight(&report).into_diagnostic()?,
                OutputMode::Console => ConsoleOutput::print_preflight(&report),
            }
        }
        Command::Catalog => {
            let result = offline_app(load_config()?).catalog()?;
            match mode {
                OutputMode::Json => JsonOutput::print_catalog(&result).into_diagnostic()?,
                OutputMode::Console => ConsoleOutput::print_catalog(&result),
            }
        }
        Command::Compare(args) => run_compare(args, mode)?,
    }
    Ok(())
}

fn run_compare(args: CompareArgs, mode: OutputMode) -> miette::Result<()> {
    let result = compare_snapshots(&args.original, &args.trial, &args.files)?;
    if let Some(path) = &args.output {
        write_summary(path, &result)?;
    }
    match mode {
        OutputMode::Json => JsonOutput::print_compare(&result).into_diagnostic()?,
        OutputMode::Console => ConsoleOutput::print_compare(&result),
    }
    Ok(())
}

fn selected_providers(only: Option<&str>) -> Result<Vec<Provider>, FetchError> {
    match only {
        Some(list) => {
            let providers = parse_provider_list(list)?;
            if providers.is_empty() {
                return Err(FetchError::InvalidProvider(list.to_string()));
            }
            Ok(providers)
        }
        None => Ok(Provider::ALL.to_vec()),
    }
}

fn sink(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Console => &ConsoleOutput,
    }
}

/// Commands that never issue HTTP requests run against this transport.
struct Offline;

impl HttpTransport for Offline {
    fn get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchFailure> {
        Err(FetchFailure::permanent(format!("network disabled for {url}")))
    }
}

fn offline_app(config: ResolvedConfig) -> App<Offline> {
    let fetcher = Fetcher::new(Offline, RetryPolicy::new(0, config.timeout));
    App::new(fetcher, config)
}
