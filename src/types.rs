// Core data model for the swap pipeline
//
// A swap attempt flows through a strict one-way chain:
// SwapRequest -> Quote -> UnsignedSwapTransaction -> SignedSwapTransaction
// -> SwapOutcome. A retry after quote expiry starts a new chain; nothing is
// patched in place.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use solana_sdk::{
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

use crate::error::SwapError;

/// Maximum slippage tolerance expressible in basis points
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// Caller-owned, single-use request for one swap attempt
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Amount of the input asset in base units
    pub amount: u64,
    /// Raw wallet string as supplied by the caller; classified before use
    pub payer: String,
    pub slippage_bps: u16,
    pub options: SwapOptions,
}

/// Optional knobs forwarded to the aggregator's swap endpoint
#[derive(Debug, Clone)]
pub struct SwapOptions {
    pub priority_fee_micro_lamports: Option<u64>,
    pub wrap_unwrap_sol: bool,
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self {
            priority_fee_micro_lamports: None,
            wrap_unwrap_sol: true,
        }
    }
}

impl SwapRequest {
    /// Validate local invariants before any network call.
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.amount == 0 {
            return Err(SwapError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        if self.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(SwapError::InvalidRequest(format!(
                "slippage {} bps exceeds the maximum of {} bps",
                self.slippage_bps, MAX_SLIPPAGE_BPS
            )));
        }
        if self.input_mint == self.output_mint {
            return Err(SwapError::InvalidRequest(
                "input and output assets must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// One hop of a quoted route
#[derive(Debug, Clone)]
pub struct RouteStep {
    /// Venue label reported by the aggregator (e.g. "Raydium", "Orca")
    pub venue: String,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
}

/// A time-bounded price/route proposal returned by the aggregator.
///
/// Quotes are perishable: they are never mutated, only superseded by a
/// fresh quote once they age past the staleness window.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub route: Vec<RouteStep>,
    pub price_impact_pct: f64,
    /// Full vendor response, forwarded verbatim to the swap endpoint
    pub raw: Value,
    pub fetched_at: Instant,
}

impl Quote {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Whether this quote has outlived the staleness window and must be
    /// re-fetched before a transaction is built against it.
    pub fn is_stale(&self, window: Duration) -> bool {
        self.age() > window
    }
}

/// Serialized, unsigned transaction bound to a specific payer, plus the
/// header metadata validated at decode time
#[derive(Debug, Clone)]
pub struct UnsignedSwapTransaction {
    pub tx: VersionedTransaction,
    pub required_signers: usize,
    pub account_keys: Vec<Pubkey>,
    pub instruction_count: usize,
}

impl UnsignedSwapTransaction {
    /// The transaction's fee payer (first required signer).
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }
}

/// A fully signed transaction, safe to hand to the broadcaster.
///
/// Construction enforces the signature-count invariant so an under-signed
/// transaction is rejected locally and never reaches the network.
#[derive(Debug, Clone)]
pub struct SignedSwapTransaction {
    tx: VersionedTransaction,
}

impl SignedSwapTransaction {
    pub fn try_new(tx: VersionedTransaction) -> Result<Self, SwapError> {
        let required = tx.message.header().num_required_signatures as usize;
        if required == 0 {
            return Err(SwapError::MalformedTransaction(
                "header declares zero required signers".to_string(),
            ));
        }
        let populated = tx
            .signatures
            .iter()
            .filter(|sig| **sig != Signature::default())
            .count();
        if populated < required {
            return Err(SwapError::MalformedTransaction(format!(
                "transaction carries {} of {} required signatures",
                populated, required
            )));
        }
        Ok(Self { tx })
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.tx
    }

    /// Signature of the fee payer, which identifies the transaction on chain.
    pub fn signature(&self) -> &Signature {
        // try_new guarantees at least one populated signature slot
        &self.tx.signatures[0]
    }
}

/// Terminal status of a swap attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStatus {
    Confirmed,
    /// Accepted by the network but the expected output asset showed no
    /// positive balance delta
    ConfirmedNoEffect,
    Failed,
    TimedOut,
}

/// Before/after balance for one account touched by the swap.
///
/// `mint` is `None` for native lamport balances and `Some` for SPL token
/// balances (base units of that mint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub mint: Option<Pubkey>,
    pub before: u64,
    pub after: u64,
}

impl BalanceDelta {
    pub fn delta(&self) -> i128 {
        self.after as i128 - self.before as i128
    }
}

/// Result of a swap attempt, created only after the broadcaster reaches a
/// terminal state
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub signature: Signature,
    pub status: SwapStatus,
    pub slot: Option<u64>,
    pub balance_deltas: HashMap<Pubkey, BalanceDelta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: u64, slippage_bps: u16) -> SwapRequest {
        SwapRequest {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount,
            payer: Pubkey::new_unique().to_string(),
            slippage_bps,
            options: SwapOptions::default(),
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(request(1_000_000, 50).validate().is_ok());
        assert!(request(0, 50).validate().is_err());
        assert!(request(1, 10_001).validate().is_err());
        assert!(request(1, 10_000).validate().is_ok());
    }

    #[test]
    fn test_same_mint_rejected() {
        let mut req = request(1, 50);
        req.output_mint = req.input_mint;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_quote_staleness() {
        let quote = Quote {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            in_amount: 1,
            out_amount: 1,
            route: vec![],
            price_impact_pct: 0.0,
            raw: Value::Null,
            fetched_at: Instant::now(),
        };
        assert!(!quote.is_stale(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(quote.is_stale(Duration::ZERO));
    }

    #[test]
    fn test_zero_signer_transaction_rejected() {
        use solana_sdk::message::{Message, VersionedMessage};
        // A default message declares zero required signers and carries no
        // signature slots; accepting it would leave signature() nothing to
        // return
        let tx = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::Legacy(Message::default()),
        };
        let err = SignedSwapTransaction::try_new(tx).unwrap_err();
        assert!(matches!(err, SwapError::MalformedTransaction(_)));
    }

    #[test]
    fn test_balance_delta_sign() {
        let gain = BalanceDelta { mint: None, before: 10, after: 25 };
        assert_eq!(gain.delta(), 15);
        let loss = BalanceDelta { mint: None, before: 25, after: 10 };
        assert_eq!(loss.delta(), -15);
    }
}
