use solana_sdk::pubkey::Pubkey;

/// Wrapped SOL token mint address (9 decimals).
/// Swaps into native SOL report their output against this mint even when
/// the aggregator unwraps to lamports.
pub const WSOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
