// Transaction submission and confirmation tracking
//
// Submission failures are classified before any retry decision: a
// rejection by the network (preflight/simulation failure, insufficient
// funds) is terminal and surfaced verbatim, while transient failures (rate
// limit, node unavailable) are retried with bounded exponential backoff.
// Retries always resend the identical signed payload; rebuilding a
// transaction on retry would break idempotency at the network layer.
//
// A confirmation timeout is reported as timed_out, distinct from failed: a
// timed-out transaction may still confirm later, so it is not a
// safe-to-retry state.

use std::sync::Arc;
use std::time::Duration;

use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
    rpc_request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{commitment_config::CommitmentLevel, signature::Signature};
use solana_transaction_status::TransactionConfirmationStatus;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SwapError;
use crate::types::SignedSwapTransaction;
use crate::utils::retry::RetryPolicy;

/// Default upper bound on waiting for confirmation
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default signature status poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Terminal result of awaiting confirmation for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastResult {
    Confirmed { slot: u64 },
    Failed { error: String },
    /// The timeout elapsed or the caller cancelled; the transaction may
    /// still confirm later
    TimedOut,
}

/// Submits signed transactions and polls for confirmation
pub struct Broadcaster {
    rpc_client: Arc<RpcClient>,
    retry: RetryPolicy,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl Broadcaster {
    pub fn new(
        rpc_client: Arc<RpcClient>,
        max_attempts: u32,
        confirmation_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        info!(
            max_attempts,
            confirmation_timeout_ms = confirmation_timeout.as_millis() as u64,
            "Broadcaster initialized"
        );
        Self {
            rpc_client,
            retry: RetryPolicy::new(max_attempts.saturating_sub(1)),
            confirmation_timeout,
            poll_interval,
        }
    }

    /// Submit a signed transaction, returning its signature on acceptance.
    ///
    /// Transient submission failures are retried with backoff, resending
    /// the same signed payload each time; network rejections are terminal.
    pub async fn broadcast(&self, signed: &SignedSwapTransaction) -> Result<Signature, SwapError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            ..RpcSendTransactionConfig::default()
        };

        let signature = self
            .retry
            .retry_classified(|| {
                let config = config.clone();
                async move {
                    self.rpc_client
                        .send_transaction_with_config(signed.transaction(), config)
                        .await
                        .map_err(classify_send_error)
                }
            })
            .await?;

        info!(%signature, "transaction submitted");
        Ok(signature)
    }

    /// Poll for confirmation until a terminal state, the timeout, or
    /// cancellation. Cancellation cannot recall an already-submitted
    /// transaction; it only stops the local wait.
    pub async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
    ) -> BroadcastResult {
        let deadline = Instant::now() + self.confirmation_timeout;

        loop {
            if cancel.is_cancelled() {
                warn!(%signature, "confirmation wait cancelled by caller");
                return BroadcastResult::TimedOut;
            }

            match self.rpc_client.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.first() {
                        if let Some(err) = &status.err {
                            return BroadcastResult::Failed {
                                error: format!("{:?}", err),
                            };
                        }
                        if matches!(
                            status.confirmation_status,
                            Some(TransactionConfirmationStatus::Confirmed)
                                | Some(TransactionConfirmationStatus::Finalized)
                        ) {
                            info!(%signature, slot = status.slot, "transaction confirmed");
                            return BroadcastResult::Confirmed { slot: status.slot };
                        }
                    }
                }
                Err(e) => {
                    debug!(%signature, "signature status poll failed: {}", e);
                }
            }

            if Instant::now() >= deadline {
                warn!(%signature, "confirmation wait timed out");
                return BroadcastResult::TimedOut;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(%signature, "confirmation wait cancelled by caller");
                    return BroadcastResult::TimedOut;
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Map an RPC client failure into the pipeline's terminal/transient split.
fn classify_send_error(err: ClientError) -> SwapError {
    match err.kind() {
        ClientErrorKind::TransactionError(tx_err) => {
            SwapError::RejectedByNetwork(format!("{:?}", tx_err))
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            message,
            data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
            ..
        }) => SwapError::RejectedByNetwork(format!(
            "preflight failure: {} ({:?})",
            message, sim.err
        )),
        _ => SwapError::TransientNetwork(err.to_string()),
    }
}
