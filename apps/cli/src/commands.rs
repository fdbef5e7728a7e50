//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use casenrich_core::pipeline::{ProgressReporter, RunConfig, RunSummary};
use casenrich_shared::{AppConfig, LookupConfig, LookupResult, init_config, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// casenrich: enrich CAS registry numbers with PubChem metadata.
#[derive(Parser)]
#[command(
    name = "casenrich",
    version,
    about = "Annotate a CSV of CAS numbers with names, formulas, SMILES and structure images from PubChem.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Look up every CAS number in a CSV and write an annotated copy.
    Run {
        /// Input CSV with a `cas_number`, `CAS`, `cas` or `CAS Number` column.
        input: Option<PathBuf>,

        /// Output CSV (defaults to `<input>_results.csv`).
        output: Option<PathBuf>,

        /// Maximum lookups in flight (overrides config).
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// PubChem PUG REST root URL (overrides config).
        #[arg(long, env = "CASENRICH_PUBCHEM_URL")]
        base_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "casenrich=info,casenrich_core=info,casenrich_pubchem=warn",
        1 => "casenrich=debug,casenrich_core=debug,casenrich_pubchem=debug",
        _ => "casenrich=trace,casenrich_core=trace,casenrich_pubchem=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            output,
            concurrency,
            base_url,
        } => cmd_run(input, output, concurrency, base_url).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    concurrency: Option<u32>,
    base_url: Option<String>,
) -> Result<()> {
    let input = input
        .ok_or_else(|| eyre!("missing input path. Usage: casenrich run <input.csv> [output.csv]"))?;

    if !input.is_file() {
        return Err(eyre!("input file not found: {}", input.display()));
    }

    let config = load_config()?;
    let mut lookup = LookupConfig::from(&config);
    if let Some(n) = concurrency {
        lookup.concurrency = n as usize;
    }
    if let Some(url) = base_url {
        lookup.base_url = url;
    }

    info!(
        input = %input.display(),
        concurrency = lookup.concurrency,
        base_url = %lookup.base_url,
        "enriching CAS numbers"
    );

    let run_config = RunConfig {
        input,
        output,
        lookup,
    };

    let reporter = Arc::new(CliProgress::new());
    let summary = casenrich_core::pipeline::run(&run_config, reporter).await?;

    println!();
    println!("  Lookup finished.");
    println!("  Total:     {}", summary.total);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    println!("  Output:    {}", summary.output.display());
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            bar,
            failed: AtomicUsize::new(0),
        }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("looking up CAS numbers");
    }

    fn item_done(&self, cas: &str, result: &LookupResult, _completed: usize, _total: usize) {
        let failed = match result {
            LookupResult::Success(_) => self.failed.load(Ordering::Relaxed),
            LookupResult::Failed(_) => self.failed.fetch_add(1, Ordering::Relaxed) + 1,
        };
        self.bar.set_message(format!("{cas} ({failed} failed)"));
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
