// Transaction assembly against the aggregator's swap endpoint
//
// A pure request/response step: the quote is forwarded verbatim together
// with the payer, and the returned base64 transaction is decoded and bound
// to that payer. A payer/fee-payer mismatch is surfaced as its own error
// kind because it is the failure mode where a wallet signature silently
// fails downstream.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::chain::codec;
use crate::error::SwapError;
use crate::types::{Quote, SwapOptions, UnsignedSwapTransaction};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

/// HTTP client for the aggregator's swap (transaction build) endpoint
pub struct SwapBuildClient {
    http: reqwest::Client,
    base_url: String,
    staleness_window: Duration,
}

impl SwapBuildClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        staleness_window: Duration,
    ) -> Self {
        let base_url = base_url.into();
        info!(%base_url, "SwapBuildClient initialized");
        Self {
            http,
            base_url,
            staleness_window,
        }
    }

    /// Request serialized, unsigned transaction bytes for a quote, bound to
    /// the payer. Refuses stale quotes before any network call; never
    /// mutates the quote.
    pub async fn build_swap_transaction(
        &self,
        quote: &Quote,
        payer: &Pubkey,
        options: &SwapOptions,
    ) -> Result<UnsignedSwapTransaction, SwapError> {
        if quote.is_stale(self.staleness_window) {
            return Err(SwapError::QuoteExpired {
                age_ms: quote.age().as_millis(),
                window_ms: self.staleness_window.as_millis(),
            });
        }

        let mut body = json!({
            "quoteResponse": quote.raw,
            "userPublicKey": payer.to_string(),
            "wrapAndUnwrapSol": options.wrap_unwrap_sol,
        });
        if let Some(fee) = options.priority_fee_micro_lamports {
            body["computeUnitPriceMicroLamports"] = json!(fee);
        }

        let url = format!("{}/swap", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SwapError::TransientNetwork(format!("swap request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            SwapError::TransientNetwork(format!("unreadable swap response: {}", e))
        })?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SwapError::TransientNetwork(format!(
                "aggregator error (HTTP {})",
                status
            )));
        }
        if status.is_client_error() {
            // The aggregator reports a payer the quote cannot be bound to as
            // a client error mentioning the user account
            let lowered = text.to_ascii_lowercase();
            if lowered.contains("user") || lowered.contains("payer") || lowered.contains("account")
            {
                return Err(SwapError::PayerQuoteMismatch(format!(
                    "aggregator refused payer binding (HTTP {})",
                    status
                )));
            }
            return Err(SwapError::InvalidRequest(format!(
                "aggregator rejected the swap request (HTTP {})",
                status
            )));
        }

        let parsed: SwapResponse = serde_json::from_str(&text).map_err(|e| {
            SwapError::TransientNetwork(format!("unexpected swap response schema: {}", e))
        })?;

        let decoded = codec::decode_transaction(&parsed.swap_transaction)?;
        if decoded.is_fully_signed() {
            return Err(SwapError::MalformedTransaction(
                "aggregator returned an already-signed transaction".to_string(),
            ));
        }
        let unsigned = decoded.into_unsigned();
        ensure_fee_payer(&unsigned, payer)?;

        debug!(
            required_signers = unsigned.required_signers,
            account_keys = unsigned.account_keys.len(),
            instruction_count = unsigned.instruction_count,
            "unsigned swap transaction built"
        );
        Ok(unsigned)
    }
}

/// Verify the declared payer is the transaction's fee payer.
///
/// A transaction built for a different payer would still decode and could
/// even be signed, but its signature would never validate on chain; this
/// check turns that silent failure into a distinct local error.
pub fn ensure_fee_payer(
    unsigned: &UnsignedSwapTransaction,
    payer: &Pubkey,
) -> Result<(), SwapError> {
    match unsigned.fee_payer() {
        Some(fee_payer) if fee_payer == payer => Ok(()),
        Some(fee_payer) => Err(SwapError::PayerQuoteMismatch(format!(
            "transaction names {} as fee payer, expected {}",
            fee_payer, payer
        ))),
        None => Err(SwapError::MalformedTransaction(
            "transaction carries no account keys".to_string(),
        )),
    }
}
