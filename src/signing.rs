// Client-side signing handoff
//
// The pipeline never touches a private key. After the unsigned transaction
// is built, control returns to the caller carrying the encoded payload; the
// wallet signs (or declines) out of band and the caller resumes the
// pipeline with exactly one of deliver_signature / reject, or the deadline
// lapses. No polling or blocking wait happens here.
//
// States: awaiting-signature -> { signed | rejected | expired }, all three
// terminal. The signed payload is only obtainable from the signed state, so
// nothing can reach the broadcaster from any other state.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::chain::codec;
use crate::error::SwapError;
use crate::types::{SignedSwapTransaction, UnsignedSwapTransaction};

/// Default upper bound on how long a wallet may take to respond
pub const DEFAULT_SIGNING_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    AwaitingSignature,
    Signed,
    Rejected,
    Expired,
}

/// One signing handoff for one unsigned transaction. Single-use.
#[derive(Debug)]
pub struct SigningHandoff {
    unsigned: UnsignedSwapTransaction,
    encoded: String,
    state: HandoffState,
    opened_at: Instant,
    timeout: Duration,
    signed: Option<SignedSwapTransaction>,
    rejection_reason: Option<String>,
}

impl SigningHandoff {
    /// Open a handoff, entering awaiting-signature immediately.
    pub fn open(
        unsigned: UnsignedSwapTransaction,
        timeout: Duration,
    ) -> Result<Self, SwapError> {
        let encoded = codec::encode_transaction(&unsigned.tx)?;
        info!(
            required_signers = unsigned.required_signers,
            timeout_secs = timeout.as_secs(),
            "signing handoff opened"
        );
        Ok(Self {
            unsigned,
            encoded,
            state: HandoffState::AwaitingSignature,
            opened_at: Instant::now(),
            timeout,
            signed: None,
            rejection_reason: None,
        })
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    /// Encoded unsigned transaction for the caller to forward to the wallet.
    pub fn encoded_transaction(&self) -> &str {
        &self.encoded
    }

    fn deadline_passed(&self) -> bool {
        self.opened_at.elapsed() > self.timeout
    }

    /// Transition to expired if the deadline has lapsed while still
    /// awaiting a signature. Returns true if a transition happened.
    pub fn expire_if_due(&mut self) -> bool {
        if self.state == HandoffState::AwaitingSignature && self.deadline_passed() {
            warn!("signing handoff expired without a wallet response");
            self.state = HandoffState::Expired;
            return true;
        }
        false
    }

    fn ensure_awaiting(&mut self) -> Result<(), SwapError> {
        if self.expire_if_due() {
            return Err(SwapError::SignatureExpired);
        }
        match self.state {
            HandoffState::AwaitingSignature => Ok(()),
            HandoffState::Signed => Err(SwapError::InvalidHandoffState(
                "a signature was already delivered".to_string(),
            )),
            HandoffState::Rejected => Err(SwapError::InvalidHandoffState(
                "the signature request was already rejected".to_string(),
            )),
            HandoffState::Expired => Err(SwapError::SignatureExpired),
        }
    }

    /// Accept signed wire text from the wallet.
    ///
    /// The payload must decode, must carry the exact message that was
    /// handed off, and must be fully signed; otherwise the handoff stays in
    /// awaiting-signature and the error is returned to the caller.
    pub fn deliver_signature(&mut self, text: &str) -> Result<(), SwapError> {
        self.ensure_awaiting()?;

        let decoded = codec::decode_transaction(text)?;
        if decoded.tx.message != self.unsigned.tx.message {
            return Err(SwapError::MalformedTransaction(
                "signed payload does not match the transaction that was handed off".to_string(),
            ));
        }
        let signed = SignedSwapTransaction::try_new(decoded.tx)?;

        debug!(signature = %signed.signature(), "signature delivered");
        self.state = HandoffState::Signed;
        self.signed = Some(signed);
        Ok(())
    }

    /// Record that the user declined to sign.
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), SwapError> {
        self.ensure_awaiting()?;
        let reason = reason.into();
        info!(%reason, "signature request rejected by user");
        self.state = HandoffState::Rejected;
        self.rejection_reason = Some(reason);
        Ok(())
    }

    /// Take the signed transaction, consuming the signed state's payload.
    /// Fails with the state-specific error from any other state.
    pub fn take_signed(&mut self) -> Result<SignedSwapTransaction, SwapError> {
        self.expire_if_due();
        match self.state {
            HandoffState::Signed => self.signed.take().ok_or_else(|| {
                SwapError::InvalidHandoffState("signed transaction already taken".to_string())
            }),
            HandoffState::AwaitingSignature => Err(SwapError::InvalidHandoffState(
                "no signature has been delivered yet".to_string(),
            )),
            HandoffState::Rejected => Err(SwapError::SignatureRejected(
                self.rejection_reason
                    .clone()
                    .unwrap_or_else(|| "user declined the signature request".to_string()),
            )),
            HandoffState::Expired => Err(SwapError::SignatureExpired),
        }
    }
}
