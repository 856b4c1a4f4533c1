// Wallet address classification
//
// User-supplied wallet identifiers arrive from unverified sources (chat
// text, connected-wallet state), and a syntactically plausible address for
// the wrong chain is a common failure mode. Classification is purely
// syntactic (alphabet, length, prefix) with no network call, and the
// foreign-chain heuristics live in one data table rather than scattered
// conditionals.
//
// Target-chain validity uses the exact base58/32-byte pubkey rule rather
// than a length range, so a foreign-format string can never classify as a
// valid Solana address.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Character set a foreign chain format draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    Base58,
    Hex,
    Bech32,
}

/// Syntactic fingerprint of one foreign chain's address format
#[derive(Debug, Clone, Copy)]
pub struct ChainFormat {
    pub chain: &'static str,
    pub alphabet: Alphabet,
    /// Inclusive length range of the full address string
    pub min_len: usize,
    pub max_len: usize,
    /// Required leading strings; empty slice means any prefix
    pub prefixes: &'static [&'static str],
}

/// Foreign address formats recognized well enough to name in an error.
/// Order matters: more specific prefixes are listed first.
pub const CHAIN_FORMATS: &[ChainFormat] = &[
    ChainFormat {
        chain: "ethereum",
        alphabet: Alphabet::Hex,
        min_len: 42,
        max_len: 42,
        prefixes: &["0x"],
    },
    ChainFormat {
        chain: "bitcoin",
        alphabet: Alphabet::Bech32,
        min_len: 14,
        max_len: 74,
        prefixes: &["bc1"],
    },
    ChainFormat {
        chain: "tron",
        alphabet: Alphabet::Base58,
        min_len: 34,
        max_len: 34,
        prefixes: &["T"],
    },
    ChainFormat {
        chain: "cosmos",
        alphabet: Alphabet::Bech32,
        min_len: 39,
        max_len: 45,
        prefixes: &["cosmos1"],
    },
    ChainFormat {
        chain: "bitcoin",
        alphabet: Alphabet::Base58,
        min_len: 26,
        max_len: 34,
        prefixes: &["1", "3"],
    },
];

/// Result of classifying a wallet string against the target chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressClass {
    /// A well-formed Solana address
    ValidForTarget(Pubkey),
    /// Matches a known foreign chain's format; `chain` is the guess
    ForeignChain { chain: &'static str },
    /// Ambiguous or unrecognized
    Malformed,
}

/// Classify a wallet string. Surrounding whitespace is ignored.
pub fn classify(input: &str) -> AddressClass {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return AddressClass::Malformed;
    }

    // Exact target-chain rule first: base58 alphabet decoding to 32 bytes.
    if let Ok(pubkey) = Pubkey::from_str(trimmed) {
        return AddressClass::ValidForTarget(pubkey);
    }

    for format in CHAIN_FORMATS {
        if matches_format(trimmed, format) {
            debug!(chain = format.chain, "classified foreign-chain address");
            return AddressClass::ForeignChain { chain: format.chain };
        }
    }

    AddressClass::Malformed
}

fn matches_format(input: &str, format: &ChainFormat) -> bool {
    if input.len() < format.min_len || input.len() > format.max_len {
        return false;
    }
    if !format.prefixes.is_empty() && !format.prefixes.iter().any(|p| input.starts_with(p)) {
        return false;
    }
    match format.alphabet {
        Alphabet::Base58 => bs58::decode(input).into_vec().is_ok(),
        Alphabet::Hex => input
            .strip_prefix("0x")
            .unwrap_or(input)
            .chars()
            .all(|c| c.is_ascii_hexdigit()),
        Alphabet::Bech32 => input
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_ADDRESS: &str = "So11111111111111111111111111111111111111112";
    const ETH_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
    const BTC_LEGACY: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const BTC_SEGWIT: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const TRON_ADDRESS: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";
    const COSMOS_ADDRESS: &str = "cosmos1vlthgax23ca9syk7xgaz347xmf4nunefu3cvl8";

    #[test]
    fn test_valid_solana_address() {
        match classify(SOL_ADDRESS) {
            AddressClass::ValidForTarget(pk) => assert_eq!(pk.to_string(), SOL_ADDRESS),
            other => panic!("expected ValidForTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let padded = format!("  {}\n", SOL_ADDRESS);
        assert!(matches!(classify(&padded), AddressClass::ValidForTarget(_)));
    }

    #[test]
    fn test_foreign_chain_guesses() {
        assert_eq!(classify(ETH_ADDRESS), AddressClass::ForeignChain { chain: "ethereum" });
        assert_eq!(classify(BTC_LEGACY), AddressClass::ForeignChain { chain: "bitcoin" });
        assert_eq!(classify(BTC_SEGWIT), AddressClass::ForeignChain { chain: "bitcoin" });
        assert_eq!(classify(TRON_ADDRESS), AddressClass::ForeignChain { chain: "tron" });
        assert_eq!(classify(COSMOS_ADDRESS), AddressClass::ForeignChain { chain: "cosmos" });
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(classify(""), AddressClass::Malformed);
        assert_eq!(classify("   "), AddressClass::Malformed);
        assert_eq!(classify("not an address"), AddressClass::Malformed);
        assert_eq!(classify("0xZZZZ"), AddressClass::Malformed);
        // Base58 alphabet but wrong payload length for any known format
        assert_eq!(classify("abc"), AddressClass::Malformed);
    }

    #[test]
    fn test_foreign_formats_never_valid_for_target() {
        for input in [ETH_ADDRESS, BTC_LEGACY, BTC_SEGWIT, TRON_ADDRESS, COSMOS_ADDRESS] {
            assert!(
                !matches!(classify(input), AddressClass::ValidForTarget(_)),
                "{} must not classify as a Solana address",
                input
            );
        }
    }

    #[test]
    fn test_every_generated_pubkey_is_valid() {
        for _ in 0..32 {
            let pk = Pubkey::new_unique();
            assert!(matches!(
                classify(&pk.to_string()),
                AddressClass::ValidForTarget(_)
            ));
        }
    }
}
