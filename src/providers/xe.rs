//! Fetches one historical rate per request from XE's currency tables page.

use crate::config::SourceConfig;
use crate::fetcher::{FetchError, RateFetcher, RateSample};
use crate::identity::IdentityProvider;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Replaces every HTML tag with a space so numeric cell contents stay
/// separated when rows collapse into text.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Scans text after each mention of the currency code for the first decimal
/// number inside the plausibility band. Thousands separators are stripped;
/// plain integers are ignored since a quoted rate always carries decimals.
fn extract_rate(text: &str, code: &str, min_rate: f64, max_rate: f64) -> Option<f64> {
    for (index, _) in text.match_indices(code) {
        let window: String = text[index + code.len()..].chars().take(200).collect();
        for token in window.split(|c: char| !c.is_ascii_digit() && c != '.' && c != ',') {
            if !token.contains('.') {
                continue;
            }
            let Ok(value) = token.replace(',', "").parse::<f64>() else {
                continue;
            };
            if value > min_rate && value < max_rate {
                return Some(value);
            }
        }
    }
    None
}

/// One GET per date against `{base_url}/currencytables/?from=USD&date=...`,
/// with a rotated browser identity on every request.
pub struct XeRateFetcher {
    base_url: String,
    from_currency: String,
    to_currency: String,
    min_plausible_rate: f64,
    max_plausible_rate: f64,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl XeRateFetcher {
    pub fn new(config: &SourceConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(XeRateFetcher {
            base_url: config.base_url.clone(),
            from_currency: config.from_currency.clone(),
            to_currency: config.to_currency.clone(),
            min_plausible_rate: config.min_plausible_rate,
            max_plausible_rate: config.max_plausible_rate,
            client,
            identity,
        })
    }
}

#[async_trait]
impl RateFetcher for XeRateFetcher {
    async fn fetch_rate(&self, date: NaiveDate) -> Result<RateSample, FetchError> {
        let url = format!(
            "{}/currencytables/?from={}&date={}",
            self.base_url,
            self.from_currency,
            date.format("%Y-%m-%d")
        );
        debug!("Requesting rate table from {}", url);

        let identity = self.identity.next_identity();
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, identity.user_agent);
        for (name, value) in &identity.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let text = strip_tags(&body);
        if !text.contains(&self.to_currency) {
            // The table renders without the currency on dates the source has
            // no data for (weekends, holidays).
            return Err(FetchError::NotFound);
        }

        match extract_rate(
            &text,
            &self.to_currency,
            self.min_plausible_rate,
            self.max_plausible_rate,
        ) {
            Some(rate) => {
                debug!(%date, rate, "Extracted rate");
                Ok(RateSample::new(date, rate))
            }
            None => Err(FetchError::Parse(format!(
                "no plausible {} rate found in page",
                self.to_currency
            ))),
        }
    }
}
