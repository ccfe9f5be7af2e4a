//! JSON API mirroring the CLI scrape operation, for browser front ends that
//! want to drive a scrape over HTTP.

use crate::config::AppConfig;
use crate::fetcher::{FetchError, FetchOutcome, RateFetcher};
use crate::identity::{IdentityProvider, RotatingIdentity};
use crate::pacing::Pacer;
use crate::providers::xe::XeRateFetcher;
use crate::range::DateRange;
use crate::scheduler::{CancelFlag, NoopObserver, ScrapeScheduler};
use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, extract::State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

struct AppState {
    config: AppConfig,
    /// Shared across requests so the user-agent pool keeps rotating instead
    /// of restarting at the first entry for every call.
    identity: Arc<RotatingIdentity>,
}

#[derive(Deserialize)]
struct ScrapeRequest {
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct ScrapeSingleRequest {
    date: String,
}

#[derive(Debug, Serialize)]
struct RateRow {
    date: String,
    rate: Option<f64>,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&FetchOutcome> for RateRow {
    fn from(outcome: &FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Success(sample) => RateRow {
                date: sample.date.to_string(),
                rate: Some(sample.rate),
                status: "success",
                error: None,
            },
            FetchOutcome::Failure { date, error } => RateRow {
                date: date.to_string(),
                rate: None,
                status: match error {
                    FetchError::NotFound => "not_found",
                    _ => "error",
                },
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct ScrapeResponse {
    success: bool,
    results: Vec<RateRow>,
    total: usize,
    successful: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

fn internal_error(message: String) -> ApiError {
    warn!(%message, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| bad_request("Invalid date format. Use YYYY-MM-DD".to_string()))
}

fn build_fetcher(state: &AppState) -> std::result::Result<XeRateFetcher, ApiError> {
    let identity: Arc<dyn IdentityProvider> = state.identity.clone();
    XeRateFetcher::new(&state.config.source, identity)
        .map_err(|e| internal_error(e.to_string()))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Scrape a whole range. Synchronous: the response arrives once every date
/// has been attempted, paced like any other run.
async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScrapeRequest>,
) -> std::result::Result<Json<ScrapeResponse>, ApiError> {
    let start = parse_date(&payload.start_date)?;
    let end = parse_date(&payload.end_date)?;
    let range = DateRange::new(start, end, state.config.max_range_days)
        .map_err(|e| bad_request(e.to_string()))?;

    let fetcher = build_fetcher(&state)?;
    let observer = NoopObserver;
    // Fresh pacing state per request; concurrent scrapes do not share counters.
    let pacer = Pacer::new(state.config.pacing.clone()).map_err(|e| internal_error(e.to_string()))?;
    let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, pacer);
    let outcomes = scheduler.run(&range, &CancelFlag::new()).await;

    let results: Vec<RateRow> = outcomes.iter().map(RateRow::from).collect();
    let successful = outcomes.iter().filter(|o| o.is_success()).count();
    Ok(Json(ScrapeResponse {
        success: true,
        total: results.len(),
        successful,
        results,
    }))
}

/// Scrape one date, for clients that page through a range themselves.
async fn scrape_single_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScrapeSingleRequest>,
) -> std::result::Result<Json<RateRow>, ApiError> {
    let date = parse_date(&payload.date)?;
    let fetcher = build_fetcher(&state)?;

    let outcome = match fetcher.fetch_rate(date).await {
        Ok(sample) => FetchOutcome::Success(sample),
        Err(error) => FetchOutcome::Failure { date, error },
    };
    Ok(Json(RateRow::from(&outcome)))
}

pub async fn serve(config: AppConfig, port: u16) -> Result<()> {
    let state = Arc::new(AppState {
        config,
        identity: Arc::new(RotatingIdentity::new()),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/scrape", post(scrape_handler))
        .route("/api/scrape-single", post(scrape_single_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(port, "Scrape API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RateSample;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn state_for(base_url: &str) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.source.base_url = base_url.to_string();
        Arc::new(AppState {
            config,
            identity: Arc::new(RotatingIdentity::new()),
        })
    }

    #[tokio::test]
    async fn test_single_date_requests_rotate_user_agents() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/currencytables/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><table><tr><td>CAD</td><td>1.3456</td></tr></table></html>",
            ))
            .mount(&mock_server)
            .await;

        let state = state_for(&mock_server.uri());
        for _ in 0..2 {
            scrape_single_handler(
                State(state.clone()),
                Json(ScrapeSingleRequest {
                    date: "2024-01-15".to_string(),
                }),
            )
            .await
            .unwrap();
        }

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let agents: Vec<&str> = requests
            .iter()
            .map(|r| r.headers.get("user-agent").unwrap().to_str().unwrap())
            .collect();
        // The pool advances between requests served by the same state.
        assert_ne!(agents[0], agents[1]);
    }

    #[test]
    fn test_success_row_shape() {
        let outcome = FetchOutcome::Success(RateSample::new(date("2024-01-01"), 1.3456));
        let row = RateRow::from(&outcome);
        assert_eq!(row.date, "2024-01-01");
        assert_eq!(row.rate, Some(1.3456));
        assert_eq!(row.status, "success");
        assert!(row.error.is_none());
    }

    #[test]
    fn test_not_found_row_shape() {
        let outcome = FetchOutcome::Failure {
            date: date("2024-01-06"),
            error: FetchError::NotFound,
        };
        let row = RateRow::from(&outcome);
        assert_eq!(row.status, "not_found");
        assert_eq!(row.rate, None);
        assert!(row.error.is_some());
    }

    #[test]
    fn test_network_failure_row_shape() {
        let outcome = FetchOutcome::Failure {
            date: date("2024-01-06"),
            error: FetchError::Network("timed out".to_string()),
        };
        let row = RateRow::from(&outcome);
        assert_eq!(row.status, "error");
        assert_eq!(row.error.as_deref(), Some("network error: timed out"));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2024-01-01").is_ok());
        assert!(parse_date("01/02/2024").is_err());
        assert!(parse_date("not-a-date").is_err());
    }
}
