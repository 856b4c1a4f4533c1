// Quote acquisition against the aggregator's HTTP API
//
// Routing and liquidity are delegated entirely to the upstream aggregator;
// this client only validates inputs, classifies failures, and shapes the
// vendor JSON into the pipeline's Quote. Quotes are perishable: the
// staleness window is enforced again by the build stage before a
// transaction is requested against a quote.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::SwapError;
use crate::types::{Quote, RouteStep, SwapRequest};

/// Default quote staleness window
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(30);

/// Delay before the single retry allowed on an upstream rate limit
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Classified quote failure, before mapping into the pipeline error
#[derive(Debug)]
enum QuoteFailure {
    NoRoute,
    RateLimited(String),
    Rejected(String),
    Upstream(String),
}

impl From<QuoteFailure> for SwapError {
    fn from(failure: QuoteFailure) -> Self {
        match failure {
            QuoteFailure::NoRoute => SwapError::NoRoute,
            QuoteFailure::RateLimited(msg) | QuoteFailure::Upstream(msg) => {
                SwapError::TransientNetwork(msg)
            }
            QuoteFailure::Rejected(msg) => SwapError::InvalidRequest(msg),
        }
    }
}

/// Vendor JSON shape (Jupiter v6 quote endpoint); opaque beyond these fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input_mint: String,
    output_mint: String,
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
    #[serde(default)]
    route_plan: Vec<RoutePlanStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanStep {
    swap_info: SwapInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInfo {
    #[serde(default)]
    label: Option<String>,
    input_mint: String,
    output_mint: String,
    in_amount: String,
    out_amount: String,
}

/// HTTP client for the aggregator's quote endpoint
pub struct QuoteClient {
    http: reqwest::Client,
    base_url: String,
    staleness_window: Duration,
}

impl QuoteClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, staleness_window: Duration) -> Self {
        let base_url = base_url.into();
        info!(%base_url, staleness_secs = staleness_window.as_secs(), "QuoteClient initialized");
        Self {
            http,
            base_url,
            staleness_window,
        }
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// Fetch a quote for the request's pair and amount.
    ///
    /// No-route failures are returned immediately; a rate-limited response
    /// is retried exactly once after a short delay.
    pub async fn get_quote(&self, request: &SwapRequest) -> Result<Quote, SwapError> {
        request.validate()?;

        match self.fetch_quote_once(request).await {
            Ok(quote) => Ok(quote),
            Err(QuoteFailure::RateLimited(msg)) => {
                warn!("quote request rate limited, retrying once: {}", msg);
                tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
                self.fetch_quote_once(request).await.map_err(SwapError::from)
            }
            Err(failure) => Err(failure.into()),
        }
    }

    async fn fetch_quote_once(&self, request: &SwapRequest) -> Result<Quote, QuoteFailure> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| QuoteFailure::Upstream(format!("quote request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuoteFailure::Upstream(format!("unreadable quote response: {}", e)))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(QuoteFailure::RateLimited(format!(
                "aggregator rate limit (HTTP {})",
                status
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND || is_no_route_body(&body) {
            return Err(QuoteFailure::NoRoute);
        }
        if status.is_client_error() {
            return Err(QuoteFailure::Rejected(format!(
                "aggregator rejected the quote request (HTTP {}): {}",
                status,
                truncate(&body, 200)
            )));
        }
        if !status.is_success() {
            return Err(QuoteFailure::Upstream(format!(
                "aggregator error (HTTP {}): {}",
                status,
                truncate(&body, 200)
            )));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| QuoteFailure::Upstream(format!("unparseable quote response: {}", e)))?;
        let parsed: QuoteResponse = serde_json::from_value(raw.clone())
            .map_err(|e| QuoteFailure::Upstream(format!("unexpected quote schema: {}", e)))?;

        let quote = shape_quote(parsed, raw)?;
        debug!(
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            hops = quote.route.len(),
            price_impact_pct = quote.price_impact_pct,
            "quote fetched"
        );
        Ok(quote)
    }
}

fn shape_quote(parsed: QuoteResponse, raw: Value) -> Result<Quote, QuoteFailure> {
    let route = parsed
        .route_plan
        .into_iter()
        .map(|step| {
            Ok(RouteStep {
                venue: step.swap_info.label.unwrap_or_else(|| "unknown".to_string()),
                input_mint: parse_mint(&step.swap_info.input_mint)?,
                output_mint: parse_mint(&step.swap_info.output_mint)?,
                in_amount: parse_amount(&step.swap_info.in_amount)?,
                out_amount: parse_amount(&step.swap_info.out_amount)?,
            })
        })
        .collect::<Result<Vec<_>, QuoteFailure>>()?;

    Ok(Quote {
        input_mint: parse_mint(&parsed.input_mint)?,
        output_mint: parse_mint(&parsed.output_mint)?,
        in_amount: parse_amount(&parsed.in_amount)?,
        out_amount: parse_amount(&parsed.out_amount)?,
        price_impact_pct: parsed
            .price_impact_pct
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0),
        route,
        raw,
        fetched_at: Instant::now(),
    })
}

fn parse_mint(s: &str) -> Result<Pubkey, QuoteFailure> {
    Pubkey::from_str(s)
        .map_err(|_| QuoteFailure::Upstream(format!("invalid mint in quote response: {}", s)))
}

fn parse_amount(s: &str) -> Result<u64, QuoteFailure> {
    s.parse()
        .map_err(|_| QuoteFailure::Upstream(format!("invalid amount in quote response: {}", s)))
}

fn is_no_route_body(body: &str) -> bool {
    body.contains("COULD_NOT_FIND_ANY_ROUTE") || body.contains("No route found")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
