//! casenrich CLI: annotate CAS numbers in a CSV with PubChem metadata.
//!
//! Reads a CSV of CAS registry numbers, resolves each against PubChem with
//! bounded concurrency, and writes an annotated results CSV.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage errors exit 1 like every other fatal error; help and
            // version output still exit 0.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    commands::init_tracing(&cli);
    commands::run(cli).await
}
