// Error taxonomy for the swap execution pipeline
//
// Classification happens as early as possible (address and quote stages) so
// the most specific, user-actionable error reaches the caller instead of a
// generic failure surfacing at broadcast time. Callers receive structured
// errors, never raw exception text.

use serde::Serialize;
use thiserror::Error;

/// Errors produced by the swap pipeline, one variant per failure kind.
///
/// Only `TransientNetwork` is retryable; retries are applied exclusively at
/// the quote and broadcast boundaries. Every other kind is terminal and
/// surfaced to the caller untouched.
#[derive(Error, Debug)]
pub enum SwapError {
    /// The supplied wallet string is not a plausible address on any known chain
    #[error("malformed wallet address: {0}")]
    MalformedAddress(String),

    /// The supplied wallet string matches a foreign chain's address format
    #[error("this looks like a {chain} address, not a Solana address")]
    WrongChainAddress { chain: &'static str },

    /// The aggregator found no route for the requested pair and amount
    #[error("no swap route found for the requested pair")]
    NoRoute,

    /// The quote aged past the staleness window and must be re-fetched
    #[error("quote is stale ({age_ms} ms old, window {window_ms} ms); re-fetch before building")]
    QuoteExpired { age_ms: u128, window_ms: u128 },

    /// The built transaction's fee payer does not match the declared payer
    #[error("payer does not match the transaction fee payer: {0}")]
    PayerQuoteMismatch(String),

    /// The wire payload failed structural validation
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The network rejected the submission (simulation failure, insufficient
    /// funds). Terminal; the node's message is carried verbatim.
    #[error("transaction rejected by network: {0}")]
    RejectedByNetwork(String),

    /// Rate limit or node unavailability; safe to retry with backoff
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// The user declined to sign
    #[error("signature request rejected: {0}")]
    SignatureRejected(String),

    /// The signing deadline elapsed without a response
    #[error("signature request expired before a wallet responded")]
    SignatureExpired,

    /// The transaction confirmed but produced no meaningful balance change
    #[error("transaction confirmed but produced no balance change for the output asset")]
    ConfirmedNoEffect,

    /// The swap request violated a local invariant (amount, slippage range)
    #[error("invalid swap request: {0}")]
    InvalidRequest(String),

    /// A signing handoff operation was attempted from the wrong state
    #[error("invalid signing handoff state: {0}")]
    InvalidHandoffState(String),
}

impl SwapError {
    /// Stable kind string reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedAddress(_) => "malformed-address",
            Self::WrongChainAddress { .. } => "wrong-chain-address",
            Self::NoRoute => "no-route",
            Self::QuoteExpired { .. } => "quote-expired",
            Self::PayerQuoteMismatch(_) => "payer-quote-mismatch",
            Self::MalformedTransaction(_) => "malformed-transaction",
            Self::RejectedByNetwork(_) => "rejected-by-network",
            Self::TransientNetwork(_) => "transient-network",
            Self::SignatureRejected(_) => "signature-rejected",
            Self::SignatureExpired => "signature-expired",
            Self::ConfirmedNoEffect => "confirmed-but-no-effect",
            Self::InvalidRequest(_) => "invalid-request",
            Self::InvalidHandoffState(_) => "invalid-handoff-state",
        }
    }

    /// Whether an automatic retry of the failed operation may succeed.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

/// Wire form of an error returned to callers: `{kind, message, retryable}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&SwapError> for ErrorReport {
    fn from(err: &SwapError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(SwapError::NoRoute.kind(), "no-route");
        assert_eq!(
            SwapError::WrongChainAddress { chain: "ethereum" }.kind(),
            "wrong-chain-address"
        );
        assert_eq!(SwapError::ConfirmedNoEffect.kind(), "confirmed-but-no-effect");
        assert_eq!(SwapError::SignatureExpired.kind(), "signature-expired");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(SwapError::TransientNetwork("429".to_string()).retryable());

        assert!(!SwapError::NoRoute.retryable());
        assert!(!SwapError::RejectedByNetwork("sim failed".to_string()).retryable());
        assert!(!SwapError::QuoteExpired { age_ms: 31_000, window_ms: 30_000 }.retryable());
        assert!(!SwapError::SignatureExpired.retryable());
        assert!(!SwapError::MalformedTransaction("truncated".to_string()).retryable());
    }

    #[test]
    fn test_error_report_shape() {
        let err = SwapError::WrongChainAddress { chain: "bitcoin" };
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, "wrong-chain-address");
        assert!(report.message.contains("bitcoin"));
        assert!(!report.retryable);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "wrong-chain-address");
        assert_eq!(json["retryable"], false);
    }
}
