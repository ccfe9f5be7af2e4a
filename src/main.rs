use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use fxscrape::export::ExportFormat;
use fxscrape::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxscrape::AppCommand {
    fn from(cmd: Commands) -> fxscrape::AppCommand {
        match cmd {
            Commands::Scrape {
                start,
                end,
                format,
                output,
            } => fxscrape::AppCommand::Scrape {
                start,
                end,
                format,
                output,
            },
            Commands::Serve { port } => fxscrape::AppCommand::Serve { port },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Scrape historical rates for a date range
    Scrape {
        /// First date to fetch (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last date to fetch, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Export the fetched samples in this format
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        /// Write the export to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the scrape API over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fxscrape::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

const DEFAULT_CONFIG: &str = r#"---
source:
  base_url: "https://www.xe.com"
  from_currency: "USD"
  to_currency: "CAD"
  # Numbers outside this band are not accepted as the rate.
  min_plausible_rate: 0.5
  max_plausible_rate: 2.5

# Delays in milliseconds between outbound requests.
pacing:
  min_delay_ms: 2500
  max_delay_ms: 5000
  jitter_ms: 750
  burst_limit: 5
  burst_cooldown_ms: 20000

max_range_days: 90
"#;

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = fxscrape::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxscrape::config::AppConfig;

    #[test]
    fn test_written_config_covers_every_default() {
        let written: AppConfig =
            serde_yaml::from_str(DEFAULT_CONFIG).expect("Failed to parse written config");
        let defaults = AppConfig::default();

        assert_eq!(written.source.base_url, defaults.source.base_url);
        assert_eq!(written.source.from_currency, defaults.source.from_currency);
        assert_eq!(written.source.to_currency, defaults.source.to_currency);
        assert_eq!(
            written.source.min_plausible_rate,
            defaults.source.min_plausible_rate
        );
        assert_eq!(
            written.source.max_plausible_rate,
            defaults.source.max_plausible_rate
        );
        assert_eq!(written.pacing.min_delay_ms, defaults.pacing.min_delay_ms);
        assert_eq!(written.pacing.max_delay_ms, defaults.pacing.max_delay_ms);
        assert_eq!(written.pacing.jitter_ms, defaults.pacing.jitter_ms);
        assert_eq!(written.pacing.burst_limit, defaults.pacing.burst_limit);
        assert_eq!(
            written.pacing.burst_cooldown_ms,
            defaults.pacing.burst_cooldown_ms
        );
        assert_eq!(written.max_range_days, defaults.max_range_days);
        written.pacing.validate().expect("Defaults must be valid");
    }
}
