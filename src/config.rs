use std::time::Duration;

use anyhow::{Context, Result};

/// Pipeline configuration, loaded from environment variables with defaults
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the aggregator's quote/swap API
    pub aggregator_base_url: String,
    /// Solana RPC endpoint for broadcast and verification
    pub rpc_url: String,
    /// How long a quote stays usable before it must be re-fetched
    pub quote_staleness: Duration,
    /// Upper bound on waiting for a wallet signature
    pub signing_timeout: Duration,
    /// Upper bound on waiting for on-chain confirmation
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,
    /// Total submission attempts at the broadcast stage
    pub broadcast_max_attempts: u32,
    /// Slippage tolerance for callers that build a `SwapRequest` without
    /// their own; the pipeline itself always uses the request's value
    pub default_slippage_bps: u16,
    pub http_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aggregator_base_url: "https://quote-api.jup.ag/v6".to_string(),
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            quote_staleness: Duration::from_secs(30),
            signing_timeout: Duration::from_secs(120),
            confirmation_timeout: Duration::from_millis(60_000),
            confirmation_poll_interval: Duration::from_millis(400),
            broadcast_max_attempts: 3,
            default_slippage_bps: 50,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            aggregator_base_url: get_env_or_default(
                "AGGREGATOR_BASE_URL",
                &defaults.aggregator_base_url,
            ),
            rpc_url: get_env_or_default("RPC_URL", &defaults.rpc_url),
            quote_staleness: Duration::from_secs(get_u64_env("QUOTE_STALENESS_SECONDS", 30)?),
            signing_timeout: Duration::from_secs(get_u64_env("SIGNING_TIMEOUT_SECONDS", 120)?),
            confirmation_timeout: Duration::from_millis(get_u64_env(
                "CONFIRMATION_TIMEOUT_MS",
                60_000,
            )?),
            confirmation_poll_interval: Duration::from_millis(get_u64_env(
                "CONFIRMATION_POLL_INTERVAL_MS",
                400,
            )?),
            broadcast_max_attempts: get_u32_env("BROADCAST_MAX_ATTEMPTS", 3)?,
            default_slippage_bps: u16::try_from(get_u32_env("DEFAULT_SLIPPAGE_BPS", 50)?)
                .context("DEFAULT_SLIPPAGE_BPS exceeds u16 range")?,
            http_timeout: Duration::from_secs(get_u64_env("HTTP_TIMEOUT_SECONDS", 30)?),
        })
    }
}

// ============================================================================
// Helper Functions for Environment Variable Parsing
// ============================================================================

/// Get environment variable or return default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get u32 environment variable with default
fn get_u32_env(key: &str, default: u32) -> Result<u32> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u32", key))
}

/// Get u64 environment variable with default
fn get_u64_env(key: &str, default: u64) -> Result<u64> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {} as u64", key))
}
