//! Serialization of a finished scrape run into the supported export formats.

use crate::fetcher::{FetchOutcome, RateSample};
use anyhow::{Context, Result};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Tsv,
    Csv,
    Json,
    /// A Rust map literal, ready to paste into source.
    Rust,
}

/// Successful samples from a run, insertion order preserved (which is date
/// order, by the scheduler's contract).
pub fn successful_samples(outcomes: &[FetchOutcome]) -> Vec<RateSample> {
    outcomes.iter().filter_map(|o| o.sample().cloned()).collect()
}

pub fn render(samples: &[RateSample], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Tsv => render_delimited(samples, b'\t'),
        ExportFormat::Csv => render_delimited(samples, b','),
        ExportFormat::Json => {
            serde_json::to_string_pretty(samples).context("Failed to serialize samples to JSON")
        }
        ExportFormat::Rust => Ok(render_rust_map(samples)),
    }
}

fn render_delimited(samples: &[RateSample], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(["date", "rate"])?;
    for sample in samples {
        writer.write_record([sample.date.to_string(), sample.rate.to_string()])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush csv writer: {e}"))?;
    String::from_utf8(bytes).context("csv output was not valid UTF-8")
}

fn render_rust_map(samples: &[RateSample]) -> String {
    let mut out = String::from("HashMap::from([\n");
    for sample in samples {
        out.push_str(&format!("    (\"{}\", {}),\n", sample.date, sample.rate));
    }
    out.push_str("])\n");
    out
}
