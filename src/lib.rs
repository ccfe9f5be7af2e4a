pub mod cli;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod identity;
pub mod log;
pub mod pacing;
pub mod providers;
pub mod range;
pub mod scheduler;
pub mod server;

use crate::export::ExportFormat;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    Scrape {
        start: NaiveDate,
        end: NaiveDate,
        format: Option<ExportFormat>,
        output: Option<PathBuf>,
    },
    Serve {
        port: u16,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxscrape starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Scrape {
            start,
            end,
            format,
            output,
        } => {
            cli::scrape::run(
                &config,
                cli::scrape::ScrapeArgs {
                    start,
                    end,
                    format,
                    output,
                },
            )
            .await
        }
        AppCommand::Serve { port } => server::serve(config, port).await,
    }
}
