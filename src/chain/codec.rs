// Wire codec for swap transactions
//
// Transactions cross process boundaries as base64 text. Transport layers
// (chat relays, copy-paste, JSON pretty-printers) are known to inject
// incidental whitespace and newlines into that text, so decoding strips all
// whitespace before base64 decoding. Structural validation failures map to
// a distinct `malformed-transaction` error so callers can tell bad
// transport from bad logic upstream.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_sdk::{
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::debug;

use crate::error::SwapError;
use crate::types::UnsignedSwapTransaction;

/// Maximum serialized transaction size (Solana packet limit)
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Maximum number of account keys a message may reference
pub const MAX_ACCOUNT_KEYS: usize = 256;

/// A structurally valid transaction recovered from wire text, signed or not
#[derive(Debug, Clone)]
pub struct DecodedSwapTransaction {
    pub tx: VersionedTransaction,
    pub required_signers: usize,
    pub account_keys: Vec<Pubkey>,
    pub instruction_count: usize,
}

impl DecodedSwapTransaction {
    /// Count of populated (non-placeholder) signature slots.
    pub fn populated_signatures(&self) -> usize {
        self.tx
            .signatures
            .iter()
            .filter(|sig| **sig != Signature::default())
            .count()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.populated_signatures() >= self.required_signers
    }

    pub fn into_unsigned(self) -> UnsignedSwapTransaction {
        UnsignedSwapTransaction {
            required_signers: self.required_signers,
            account_keys: self.account_keys,
            instruction_count: self.instruction_count,
            tx: self.tx,
        }
    }
}

/// Decode base64 wire text into a validated transaction.
///
/// All whitespace is stripped first; any structural violation yields
/// `SwapError::MalformedTransaction` with the reason.
pub fn decode_transaction(text: &str) -> Result<DecodedSwapTransaction, SwapError> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if stripped.is_empty() {
        return Err(SwapError::MalformedTransaction(
            "empty transaction payload".to_string(),
        ));
    }

    let bytes = BASE64
        .decode(stripped.as_bytes())
        .map_err(|e| SwapError::MalformedTransaction(format!("invalid base64: {}", e)))?;

    if bytes.len() > MAX_TRANSACTION_SIZE {
        return Err(SwapError::MalformedTransaction(format!(
            "{} bytes exceeds the {} byte transaction limit",
            bytes.len(),
            MAX_TRANSACTION_SIZE
        )));
    }

    let tx: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| SwapError::MalformedTransaction(format!("undecodable payload: {}", e)))?;

    // Total length must be exactly the serialized transaction; trailing
    // garbage means the payload was corrupted in transport.
    let expected_len = bincode::serialized_size(&tx)
        .map_err(|e| SwapError::MalformedTransaction(format!("unsizable payload: {}", e)))?;
    if expected_len != bytes.len() as u64 {
        return Err(SwapError::MalformedTransaction(format!(
            "{} trailing bytes after transaction",
            bytes.len() as u64 - expected_len
        )));
    }

    let required_signers = tx.message.header().num_required_signatures as usize;
    let account_keys = tx.message.static_account_keys().to_vec();
    let instruction_count = tx.message.instructions().len();

    if required_signers == 0 {
        return Err(SwapError::MalformedTransaction(
            "header declares zero required signers".to_string(),
        ));
    }
    if tx.signatures.len() != required_signers {
        return Err(SwapError::MalformedTransaction(format!(
            "header declares {} signers but {} signature slots are present",
            required_signers,
            tx.signatures.len()
        )));
    }
    if account_keys.len() > MAX_ACCOUNT_KEYS {
        return Err(SwapError::MalformedTransaction(format!(
            "{} account keys exceeds the protocol limit of {}",
            account_keys.len(),
            MAX_ACCOUNT_KEYS
        )));
    }
    if required_signers > account_keys.len() {
        return Err(SwapError::MalformedTransaction(format!(
            "{} required signers but only {} account keys",
            required_signers,
            account_keys.len()
        )));
    }
    if instruction_count == 0 {
        return Err(SwapError::MalformedTransaction(
            "transaction carries no instructions".to_string(),
        ));
    }

    debug!(
        required_signers,
        account_keys = account_keys.len(),
        instruction_count,
        "decoded transaction"
    );

    Ok(DecodedSwapTransaction {
        tx,
        required_signers,
        account_keys,
        instruction_count,
    })
}

/// Encode a transaction as base64 wire text.
pub fn encode_transaction(tx: &VersionedTransaction) -> Result<String, SwapError> {
    let bytes = bincode::serialize(tx)
        .map_err(|e| SwapError::MalformedTransaction(format!("unserializable: {}", e)))?;
    Ok(BASE64.encode(bytes))
}
