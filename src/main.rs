use anyhow::Result;
use gtally::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);
    cli.execute()
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gtally=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
