//! The `scrape` command: runs a paced range scrape and presents the results.

use crate::cli::ui;
use crate::config::AppConfig;
use crate::export::{self, ExportFormat};
use crate::fetcher::FetchOutcome;
use crate::identity::RotatingIdentity;
use crate::pacing::Pacer;
use crate::providers::xe::XeRateFetcher;
use crate::range::DateRange;
use crate::scheduler::{CancelFlag, ProgressObserver, ScrapeProgress, ScrapeScheduler};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

pub struct ScrapeArgs {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub format: Option<ExportFormat>,
    pub output: Option<PathBuf>,
}

/// Feeds scheduler progress into an indicatif bar. `inc` and `set_message`
/// are non-blocking, which is what the observer contract requires.
struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressObserver for ProgressBarObserver {
    fn on_outcome(&self, progress: &ScrapeProgress, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success(sample) => {
                self.bar
                    .set_message(format!("{} -> {:.4}", progress.date, sample.rate));
            }
            FetchOutcome::Failure { error, .. } => {
                self.bar
                    .set_message(format!("{} failed: {}", progress.date, error));
            }
        }
        self.bar.inc(1);
    }
}

pub async fn run(config: &AppConfig, args: ScrapeArgs) -> Result<()> {
    let range = DateRange::new(args.start, args.end, config.max_range_days)?;

    let identity = Arc::new(RotatingIdentity::new());
    let fetcher = XeRateFetcher::new(&config.source, identity)?;
    let pacer = Pacer::new(config.pacing.clone())?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping after the current date");
                cancel.cancel();
            }
        });
    }

    let bar = ui::new_progress_bar(range.len() as u64);
    bar.set_message("Scraping rates...");
    let observer = ProgressBarObserver { bar: bar.clone() };

    let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, pacer);
    let outcomes = scheduler.run(&range, &cancel).await;
    bar.finish_and_clear();

    display_results(config, &outcomes);

    if let Some(format) = args.format {
        let samples = export::successful_samples(&outcomes);
        let rendered = export::render(&samples, format)?;
        match &args.output {
            Some(path) => {
                std::fs::write(path, rendered)
                    .with_context(|| format!("Failed to write export to {}", path.display()))?;
                println!("\nExport written to {}", path.display());
            }
            None => print!("\n{rendered}"),
        }
    }

    Ok(())
}

fn display_results(config: &AppConfig, outcomes: &[FetchOutcome]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell(&format!(
            "Rate ({}/{})",
            config.source.from_currency, config.source.to_currency
        )),
    ]);

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Success(sample) => {
                table.add_row(vec![
                    comfy_table::Cell::new(sample.date.to_string()),
                    ui::rate_cell(sample.rate),
                ]);
            }
            FetchOutcome::Failure { date, error } => {
                table.add_row(vec![
                    comfy_table::Cell::new(date.to_string()),
                    ui::error_cell(&error.to_string()),
                ]);
            }
        }
    }

    let successful = outcomes.iter().filter(|o| o.is_success()).count();

    println!(
        "{}\n",
        ui::style_text(
            &format!(
                "Historical {}/{} rates",
                config.source.from_currency, config.source.to_currency
            ),
            ui::StyleType::Title
        )
    );
    println!("{table}");
    println!(
        "\n{}: {}",
        ui::style_text("Fetched", ui::StyleType::SummaryLabel),
        ui::style_text(
            &format!("{successful}/{} dates", outcomes.len()),
            if successful == outcomes.len() {
                ui::StyleType::SummaryValue
            } else {
                ui::StyleType::Error
            }
        )
    );
}
