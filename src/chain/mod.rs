pub mod broadcaster;
pub mod codec;
pub mod constants;
pub mod verifier;

pub use broadcaster::{BroadcastResult, Broadcaster};
pub use codec::{decode_transaction, encode_transaction, DecodedSwapTransaction};
pub use constants::WSOL_MINT;
pub use verifier::OutcomeVerifier;
