// Swap execution pipeline orchestrator
//
// One pipeline instance serves any number of swap attempts; each attempt
// flows through its own PendingSwap with no shared mutable state. The
// pipeline suspends exactly once, at the signing handoff: prepare() returns
// the encoded unsigned transaction to the caller, and submit() resumes
// after the caller delivers a signature. Concurrent attempts by the same
// payer are not coordinated here; avoiding double-submission is the
// caller's responsibility.

use std::sync::Arc;
use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::address::{classify, AddressClass};
use crate::aggregator::{QuoteClient, SwapBuildClient};
use crate::chain::broadcaster::Broadcaster;
use crate::chain::verifier::OutcomeVerifier;
use crate::config::PipelineConfig;
use crate::error::SwapError;
use crate::signing::{HandoffState, SigningHandoff};
use crate::types::{Quote, SwapOutcome, SwapRequest};

/// A swap attempt suspended at the signing handoff. Single-use: consumed by
/// `SwapPipeline::submit`.
#[derive(Debug)]
pub struct PendingSwap {
    payer: Pubkey,
    output_mint: Pubkey,
    quote: Quote,
    handoff: SigningHandoff,
}

impl PendingSwap {
    /// Encoded unsigned transaction for the caller to hand to the wallet.
    pub fn encoded_transaction(&self) -> &str {
        self.handoff.encoded_transaction()
    }

    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn handoff_state(&self) -> HandoffState {
        self.handoff.state()
    }

    /// Resume with the wallet's signed payload.
    pub fn deliver_signature(&mut self, text: &str) -> Result<(), SwapError> {
        self.handoff.deliver_signature(text)
    }

    /// Resume with an explicit user rejection.
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), SwapError> {
        self.handoff.reject(reason)
    }

    /// Expire the handoff if its deadline has lapsed.
    pub fn expire_if_due(&mut self) -> bool {
        self.handoff.expire_if_due()
    }
}

/// The swap execution pipeline: quote, build, signing handoff, broadcast,
/// verification. All client handles are injected at construction.
pub struct SwapPipeline {
    quote_client: QuoteClient,
    build_client: SwapBuildClient,
    broadcaster: Broadcaster,
    verifier: OutcomeVerifier,
    signing_timeout: Duration,
}

impl SwapPipeline {
    pub fn new(
        quote_client: QuoteClient,
        build_client: SwapBuildClient,
        broadcaster: Broadcaster,
        verifier: OutcomeVerifier,
        signing_timeout: Duration,
    ) -> Self {
        Self {
            quote_client,
            build_client,
            broadcaster,
            verifier,
            signing_timeout,
        }
    }

    /// Build a pipeline from configuration, constructing one HTTP client
    /// and one RPC client shared by the components that need them.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SwapError::TransientNetwork(format!("http client: {}", e)))?;
        let rpc_client = Arc::new(RpcClient::new(config.rpc_url.clone()));

        info!(
            aggregator = %config.aggregator_base_url,
            rpc = %config.rpc_url,
            "swap pipeline constructed"
        );

        Ok(Self::new(
            QuoteClient::new(
                http.clone(),
                config.aggregator_base_url.clone(),
                config.quote_staleness,
            ),
            SwapBuildClient::new(
                http,
                config.aggregator_base_url.clone(),
                config.quote_staleness,
            ),
            Broadcaster::new(
                Arc::clone(&rpc_client),
                config.broadcast_max_attempts,
                config.confirmation_timeout,
                config.confirmation_poll_interval,
            ),
            OutcomeVerifier::new(rpc_client),
            config.signing_timeout,
        ))
    }

    /// Run the pre-signature half of the pipeline: classify the payer
    /// address, validate the request, fetch a quote, build the unsigned
    /// transaction, and open the signing handoff.
    ///
    /// Address classification happens before any network call so a
    /// wrong-chain payer fails without a quote ever being fetched.
    pub async fn prepare(&self, request: SwapRequest) -> Result<PendingSwap, SwapError> {
        let payer = match classify(&request.payer) {
            AddressClass::ValidForTarget(pubkey) => pubkey,
            AddressClass::ForeignChain { chain } => {
                return Err(SwapError::WrongChainAddress { chain });
            }
            AddressClass::Malformed => {
                return Err(SwapError::MalformedAddress(request.payer.clone()));
            }
        };
        request.validate()?;

        debug!(%payer, amount = request.amount, "preparing swap");
        let quote = self.quote_client.get_quote(&request).await?;
        let unsigned = self
            .build_client
            .build_swap_transaction(&quote, &payer, &request.options)
            .await?;
        let handoff = SigningHandoff::open(unsigned, self.signing_timeout)?;

        Ok(PendingSwap {
            payer,
            output_mint: request.output_mint,
            quote,
            handoff,
        })
    }

    /// Run the post-signature half: broadcast the signed transaction, await
    /// confirmation, and verify the economic effect.
    ///
    /// Fails locally with the handoff's state error unless a signature was
    /// delivered; nothing is ever sent to the network from a rejected or
    /// expired handoff.
    pub async fn submit(
        &self,
        mut pending: PendingSwap,
        cancel: &CancellationToken,
    ) -> Result<SwapOutcome, SwapError> {
        let signed = pending.handoff.take_signed()?;

        let signature = self.broadcaster.broadcast(&signed).await?;
        let result = self.broadcaster.wait_for_confirmation(&signature, cancel).await;
        self.verifier
            .verify(&signature, &pending.payer, &pending.output_mint, &result)
            .await
    }
}
