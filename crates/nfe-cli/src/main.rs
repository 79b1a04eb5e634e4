//! `nfe` - import Brazilian NF-e XML files from the command line.
//!
//! Subcommands cover single-file and folder imports, tag discovery for
//! writing supplier configs, and the supplier/app config files themselves.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, process, suppliers, tags};

/// Read NF-e XML into invoice records with supplier order numbers
#[derive(Parser)]
#[command(name = "nfe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// App config JSON (default: <config dir>/nfe/config.json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn one NF-e XML into JSON, CSV line items, or a text summary
    Process(process::ProcessArgs),

    /// Import every XML matching a glob, skipping access keys already stored
    Batch(batch::BatchArgs),

    /// Show each leaf tag path and its text, to find where order numbers live
    Tags(tags::TagsArgs),

    /// List, add, remove, or try the per-supplier order-number patterns
    Suppliers(suppliers::SuppliersArgs),

    /// Inspect or edit the app config file
    Config(config::ConfigArgs),
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs go to stderr so that stdout carries only command output.
fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Tags(args) => tags::run(args).await,
        Commands::Suppliers(args) => suppliers::run(args, config_path).await,
        Commands::Config(args) => config::run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_maps_to_levels() {
        assert_eq!(log_level(0), Level::WARN);
        assert_eq!(log_level(2), Level::DEBUG);
        assert_eq!(log_level(9), Level::TRACE);
    }
}
