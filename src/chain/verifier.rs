// Post-hoc swap verification
//
// A transaction being "confirmed" only means the network accepted it; it
// does not mean the swap happened. This module re-fetches the confirmed
// transaction and diffs the pre/post balances recorded in its metadata. A
// confirmed transaction whose expected output asset shows no positive
// delta for the payer is downgraded to confirmed-but-no-effect rather than
// reported as a plain success.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcTransactionConfig};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{
    option_serializer::OptionSerializer, UiTransactionEncoding, UiTransactionTokenBalance,
};
use tracing::{debug, info, warn};

use crate::chain::broadcaster::BroadcastResult;
use crate::chain::constants::WSOL_MINT;
use crate::error::SwapError;
use crate::types::{BalanceDelta, SwapOutcome, SwapStatus};

/// One account's token balance at a point in time, resolved from the
/// confirmed transaction's metadata
#[derive(Debug, Clone)]
pub struct TokenBalanceSnapshot {
    pub account: Pubkey,
    pub owner: Option<Pubkey>,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Re-fetches confirmed transactions and verifies their economic effect
pub struct OutcomeVerifier {
    rpc_client: Arc<RpcClient>,
}

impl OutcomeVerifier {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self { rpc_client }
    }

    /// Build the SwapOutcome for a terminal broadcast result.
    ///
    /// Failed and timed-out submissions carry no balance deltas; confirmed
    /// submissions are re-fetched and diffed.
    pub async fn verify(
        &self,
        signature: &Signature,
        payer: &Pubkey,
        output_mint: &Pubkey,
        broadcast: &BroadcastResult,
    ) -> Result<SwapOutcome, SwapError> {
        let slot = match broadcast {
            BroadcastResult::Confirmed { slot } => *slot,
            BroadcastResult::Failed { error } => {
                warn!(%signature, %error, "transaction failed on chain");
                return Ok(SwapOutcome {
                    signature: *signature,
                    status: SwapStatus::Failed,
                    slot: None,
                    balance_deltas: HashMap::new(),
                });
            }
            BroadcastResult::TimedOut => {
                return Ok(SwapOutcome {
                    signature: *signature,
                    status: SwapStatus::TimedOut,
                    slot: None,
                    balance_deltas: HashMap::new(),
                })
            }
        };

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let fetched = self
            .rpc_client
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| {
                SwapError::TransientNetwork(format!("failed to fetch confirmed transaction: {}", e))
            })?;

        let meta = fetched.transaction.meta.ok_or_else(|| {
            SwapError::TransientNetwork("confirmed transaction carries no metadata".to_string())
        })?;
        let decoded = fetched.transaction.transaction.decode().ok_or_else(|| {
            SwapError::MalformedTransaction("undecodable confirmed transaction".to_string())
        })?;

        let mut account_keys: Vec<Pubkey> = decoded.message.static_account_keys().to_vec();
        if let OptionSerializer::Some(loaded) = &meta.loaded_addresses {
            for addr in loaded.writable.iter().chain(loaded.readonly.iter()) {
                if let Ok(key) = Pubkey::from_str(addr) {
                    account_keys.push(key);
                }
            }
        }

        let pre_tokens = token_snapshots(
            &account_keys,
            Option::<Vec<UiTransactionTokenBalance>>::from(meta.pre_token_balances.clone()),
        );
        let post_tokens = token_snapshots(
            &account_keys,
            Option::<Vec<UiTransactionTokenBalance>>::from(meta.post_token_balances.clone()),
        );

        let balance_deltas = compute_balance_deltas(
            &account_keys,
            &meta.pre_balances,
            &meta.post_balances,
            &pre_tokens,
            &post_tokens,
        );
        let output_delta = payer_output_delta(
            payer,
            output_mint,
            &pre_tokens,
            &post_tokens,
            &account_keys,
            &meta.pre_balances,
            &meta.post_balances,
        );

        let status = if output_delta > 0 {
            SwapStatus::Confirmed
        } else {
            warn!(
                %signature,
                %output_mint,
                output_delta,
                "transaction confirmed but the output asset shows no positive delta"
            );
            SwapStatus::ConfirmedNoEffect
        };

        info!(%signature, slot, ?status, "swap outcome verified");
        debug!(deltas = balance_deltas.len(), "balance deltas computed");

        Ok(SwapOutcome {
            signature: *signature,
            status,
            slot: Some(slot),
            balance_deltas,
        })
    }
}

/// Resolve vendor token-balance records into snapshots keyed by account.
fn token_snapshots(
    account_keys: &[Pubkey],
    balances: Option<Vec<UiTransactionTokenBalance>>,
) -> Vec<TokenBalanceSnapshot> {
    let mut snapshots = Vec::new();
    for balance in balances.unwrap_or_default() {
        let Some(account) = account_keys.get(balance.account_index as usize) else {
            continue;
        };
        let Ok(mint) = Pubkey::from_str(&balance.mint) else {
            continue;
        };
        let owner = Option::<String>::from(balance.owner.clone())
            .and_then(|s| Pubkey::from_str(&s).ok());
        // Recording a bad vendor amount as zero would fabricate a balance
        // drop, so the record is skipped instead
        let Ok(amount) = balance.ui_token_amount.amount.parse() else {
            warn!(
                account_index = balance.account_index,
                amount = %balance.ui_token_amount.amount,
                "skipping token balance with unparseable amount"
            );
            continue;
        };
        snapshots.push(TokenBalanceSnapshot {
            account: *account,
            owner,
            mint,
            amount,
        });
    }
    snapshots
}

/// Diff pre/post balances into an account -> {before, after} map.
///
/// Lamport entries are kept for accounts whose native balance changed;
/// token entries are kept for every account with a recorded token balance
/// and take precedence over the lamport entry for the same account.
pub fn compute_balance_deltas(
    account_keys: &[Pubkey],
    pre_lamports: &[u64],
    post_lamports: &[u64],
    pre_tokens: &[TokenBalanceSnapshot],
    post_tokens: &[TokenBalanceSnapshot],
) -> HashMap<Pubkey, BalanceDelta> {
    let mut deltas = HashMap::new();

    for (i, key) in account_keys.iter().enumerate() {
        let before = pre_lamports.get(i).copied().unwrap_or(0);
        let after = post_lamports.get(i).copied().unwrap_or(0);
        if before != after {
            deltas.insert(*key, BalanceDelta { mint: None, before, after });
        }
    }

    let mut token_accounts: HashMap<Pubkey, (Pubkey, u64, u64)> = HashMap::new();
    for snapshot in pre_tokens {
        token_accounts.insert(snapshot.account, (snapshot.mint, snapshot.amount, 0));
    }
    for snapshot in post_tokens {
        token_accounts
            .entry(snapshot.account)
            .and_modify(|entry| entry.2 = snapshot.amount)
            .or_insert((snapshot.mint, 0, snapshot.amount));
    }
    for (account, (mint, before, after)) in token_accounts {
        deltas.insert(
            account,
            BalanceDelta {
                mint: Some(mint),
                before,
                after,
            },
        );
    }

    deltas
}

/// Net change of the payer's holdings of the output mint, in base units.
///
/// Sums across every token account owned by the payer holding that mint.
/// For wrapped SOL, an aggregator that unwraps to native lamports leaves no
/// token delta, so the payer's lamport delta is used instead.
pub fn payer_output_delta(
    payer: &Pubkey,
    output_mint: &Pubkey,
    pre_tokens: &[TokenBalanceSnapshot],
    post_tokens: &[TokenBalanceSnapshot],
    account_keys: &[Pubkey],
    pre_lamports: &[u64],
    post_lamports: &[u64],
) -> i128 {
    let owned = |snapshot: &&TokenBalanceSnapshot| {
        snapshot.mint == *output_mint && snapshot.owner.as_ref() == Some(payer)
    };
    let pre: i128 = pre_tokens.iter().filter(owned).map(|s| s.amount as i128).sum();
    let post: i128 = post_tokens.iter().filter(owned).map(|s| s.amount as i128).sum();
    let token_delta = post - pre;

    let saw_token_balance =
        pre_tokens.iter().any(|s| owned(&s)) || post_tokens.iter().any(|s| owned(&s));
    if token_delta == 0 && !saw_token_balance && *output_mint == WSOL_MINT {
        if let Some(i) = account_keys.iter().position(|k| k == payer) {
            let before = pre_lamports.get(i).copied().unwrap_or(0) as i128;
            let after = post_lamports.get(i).copied().unwrap_or(0) as i128;
            return after - before;
        }
    }

    token_delta
}
