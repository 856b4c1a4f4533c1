// Solana Swap Execution Pipeline
//
// This library turns a structured swap request into a signed, broadcast,
// and verified on-chain transaction, including:
// - Wallet address classification (Solana vs foreign-chain formats)
// - Quote acquisition from an external aggregator
// - Unsigned transaction assembly bound to the payer
// - Client-side signing handoff (no private key ever enters the pipeline)
// - Broadcast with bounded retries and confirmation polling
// - Post-hoc verification of the swap's economic effect

pub mod address;
pub mod aggregator;
pub mod chain;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod signing;
pub mod types;
pub mod utils;

pub use address::{classify, AddressClass};
pub use config::PipelineConfig;
pub use error::{ErrorReport, SwapError};
pub use pipeline::{PendingSwap, SwapPipeline};
pub use signing::{HandoffState, SigningHandoff};
pub use types::{
    BalanceDelta, Quote, RouteStep, SignedSwapTransaction, SwapOptions, SwapOutcome, SwapRequest,
    SwapStatus, UnsignedSwapTransaction,
};
