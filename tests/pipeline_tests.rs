// End-to-end pipeline scenarios
//
// These tests exercise the pipeline over in-process data: transactions are
// built and signed locally, and balance verification runs on fabricated
// transaction metadata. Live-network checks against the real aggregator
// are #[ignore]d, matching how this crate is exercised in CI.

use std::time::{Duration, Instant};

use solana_sdk::{
    hash::Hash,
    message::{Message, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
    transaction::{Transaction, VersionedTransaction},
};

use solana_swap_pipeline::chain::verifier::{
    compute_balance_deltas, payer_output_delta, TokenBalanceSnapshot,
};
use solana_swap_pipeline::chain::{decode_transaction, encode_transaction};
use solana_swap_pipeline::signing::DEFAULT_SIGNING_TIMEOUT;
use solana_swap_pipeline::{
    ErrorReport, HandoffState, PipelineConfig, Quote, SigningHandoff, SwapError, SwapOptions,
    SwapPipeline, SwapRequest, SwapStatus,
};

const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Make pipeline log output visible under `RUST_LOG`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pipeline wired to unroutable endpoints: every test below must fail (or
/// succeed) before any network call is attempted.
fn offline_pipeline() -> SwapPipeline {
    init_logging();
    let config = PipelineConfig {
        aggregator_base_url: "http://127.0.0.1:0".to_string(),
        rpc_url: "http://127.0.0.1:1".to_string(),
        ..PipelineConfig::default()
    };
    SwapPipeline::from_config(&config).expect("pipeline construction")
}

fn swap_request(payer: &str) -> SwapRequest {
    SwapRequest {
        input_mint: WSOL_MINT.parse().unwrap(),
        output_mint: USDC_MINT.parse().unwrap(),
        amount: 1_000_000,
        payer: payer.to_string(),
        slippage_bps: 50,
        options: SwapOptions::default(),
    }
}

fn unsigned_transfer(payer: &Keypair) -> solana_swap_pipeline::UnsignedSwapTransaction {
    init_logging();
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
    let message = Message::new(&[ix], Some(&payer.pubkey()));
    let tx = VersionedTransaction::from(Transaction::new_unsigned(message));
    decode_transaction(&encode_transaction(&tx).unwrap())
        .unwrap()
        .into_unsigned()
}

/// Stand-in for the external wallet: decode the handed-off payload, sign
/// it, and re-encode.
fn wallet_sign(handoff: &SigningHandoff, payer: &Keypair) -> String {
    let decoded = decode_transaction(handoff.encoded_transaction()).unwrap();
    let message = match decoded.tx.message {
        VersionedMessage::Legacy(m) => m,
        _ => panic!("tests build legacy messages"),
    };
    let mut tx = Transaction::new_unsigned(message);
    tx.sign(&[payer], Hash::default());
    encode_transaction(&VersionedTransaction::from(tx)).unwrap()
}

// ---------------------------------------------------------------------------
// Scenario: foreign-chain payer fails before any quote is fetched
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_chain_payer_fails_before_quote() {
    let pipeline = offline_pipeline();

    // Bitcoin-format payer (26-34 base58 chars); endpoints are unroutable,
    // so reaching the quote stage would surface a transport error instead
    let err = pipeline
        .prepare(swap_request("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"))
        .await
        .unwrap_err();

    match &err {
        SwapError::WrongChainAddress { chain } => assert_eq!(*chain, "bitcoin"),
        other => panic!("expected WrongChainAddress, got {:?}", other),
    }
    let report = ErrorReport::from(&err);
    assert_eq!(report.kind, "wrong-chain-address");
    assert!(report.message.contains("bitcoin"));
    assert!(!report.retryable);
}

#[tokio::test]
async fn malformed_payer_fails_before_quote() {
    let pipeline = offline_pipeline();
    let err = pipeline
        .prepare(swap_request("definitely not a wallet"))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::MalformedAddress(_)));
}

#[tokio::test]
async fn invalid_amount_fails_before_quote() {
    let pipeline = offline_pipeline();
    let mut request = swap_request(&Pubkey::new_unique().to_string());
    request.amount = 0;
    let err = pipeline.prepare(request).await.unwrap_err();
    assert!(matches!(err, SwapError::InvalidRequest(_)));
}

// ---------------------------------------------------------------------------
// Scenario: signing handoff end to end, including transport corruption
// ---------------------------------------------------------------------------

#[test]
fn newline_corrupted_payload_still_signs() {
    let payer = Keypair::new();
    let mut handoff =
        SigningHandoff::open(unsigned_transfer(&payer), DEFAULT_SIGNING_TIMEOUT).unwrap();

    let signed_text = wallet_sign(&handoff, &payer);
    // Transport layers are known to wrap base64 with newlines
    let corrupted: String = signed_text
        .chars()
        .enumerate()
        .flat_map(|(i, c)| if i % 24 == 23 { vec![c, '\n'] } else { vec![c] })
        .collect();

    handoff.deliver_signature(&corrupted).unwrap();
    assert_eq!(handoff.state(), HandoffState::Signed);
}

#[test]
fn unanswered_signature_request_expires_without_broadcast() {
    let payer = Keypair::new();
    let mut handoff = SigningHandoff::open(unsigned_transfer(&payer), Duration::ZERO).unwrap();
    std::thread::sleep(Duration::from_millis(5));

    assert!(handoff.expire_if_due());
    assert_eq!(handoff.state(), HandoffState::Expired);
    // The signed payload is unobtainable, so nothing can reach the broadcaster
    assert!(matches!(
        handoff.take_signed().unwrap_err(),
        SwapError::SignatureExpired
    ));
}

#[test]
fn rejected_handoff_reports_signature_rejected() {
    let payer = Keypair::new();
    let mut handoff =
        SigningHandoff::open(unsigned_transfer(&payer), DEFAULT_SIGNING_TIMEOUT).unwrap();
    handoff.reject("user dismissed the prompt").unwrap();
    let err = handoff.take_signed().unwrap_err();
    assert_eq!(ErrorReport::from(&err).kind, "signature-rejected");
}

// ---------------------------------------------------------------------------
// Scenario: happy path over in-process data
// ---------------------------------------------------------------------------

#[test]
fn signed_payload_is_stable_across_rebroadcasts() {
    let payer = Keypair::new();
    let mut handoff =
        SigningHandoff::open(unsigned_transfer(&payer), DEFAULT_SIGNING_TIMEOUT).unwrap();
    handoff
        .deliver_signature(&wallet_sign(&handoff, &payer))
        .unwrap();
    let signed = handoff.take_signed().unwrap();

    // Broadcast retries must resend the identical payload: same signature,
    // byte-identical serialization
    let first = encode_transaction(signed.transaction()).unwrap();
    let second = encode_transaction(signed.transaction()).unwrap();
    assert_eq!(first, second);
    assert_ne!(*signed.signature(), Signature::default());
}

#[test]
fn confirmed_swap_shows_positive_output_delta() {
    let payer = Pubkey::new_unique();
    let payer_usdc = Pubkey::new_unique();
    let usdc: Pubkey = USDC_MINT.parse().unwrap();
    let account_keys = vec![payer, payer_usdc];

    // 1_000_000 lamports in (plus 5_000 fee), 153_420 USDC base units out
    let pre_lamports = vec![10_000_000, 2_039_280];
    let post_lamports = vec![8_995_000, 2_039_280];
    let pre_tokens = vec![TokenBalanceSnapshot {
        account: payer_usdc,
        owner: Some(payer),
        mint: usdc,
        amount: 0,
    }];
    let post_tokens = vec![TokenBalanceSnapshot {
        account: payer_usdc,
        owner: Some(payer),
        mint: usdc,
        amount: 153_420,
    }];

    let delta = payer_output_delta(
        &payer,
        &usdc,
        &pre_tokens,
        &post_tokens,
        &account_keys,
        &pre_lamports,
        &post_lamports,
    );
    assert_eq!(delta, 153_420);

    let deltas = compute_balance_deltas(
        &account_keys,
        &pre_lamports,
        &post_lamports,
        &pre_tokens,
        &post_tokens,
    );
    assert_eq!(deltas[&payer_usdc].delta(), 153_420);
    assert_eq!(deltas[&payer].delta(), -1_005_000);

    let status = if delta > 0 {
        SwapStatus::Confirmed
    } else {
        SwapStatus::ConfirmedNoEffect
    };
    assert_eq!(status, SwapStatus::Confirmed);
}

#[test]
fn confirmed_interaction_with_no_output_is_flagged() {
    let payer = Pubkey::new_unique();
    let payer_usdc = Pubkey::new_unique();
    let usdc: Pubkey = USDC_MINT.parse().unwrap();

    // The transaction confirmed and burned a fee, but moved no USDC
    let snapshots = vec![TokenBalanceSnapshot {
        account: payer_usdc,
        owner: Some(payer),
        mint: usdc,
        amount: 42,
    }];
    let delta = payer_output_delta(
        &payer,
        &usdc,
        &snapshots,
        &snapshots,
        &[payer],
        &[10_000_000],
        &[9_995_000],
    );
    assert_eq!(delta, 0);

    let status = if delta > 0 {
        SwapStatus::Confirmed
    } else {
        SwapStatus::ConfirmedNoEffect
    };
    assert_eq!(status, SwapStatus::ConfirmedNoEffect);
    assert_eq!(SwapError::ConfirmedNoEffect.kind(), "confirmed-but-no-effect");
}

// Compile-time check: the post-signature half must be spawnable on the
// multithreaded runtime.
#[allow(dead_code)]
fn submit_future_is_send(
    pipeline: &SwapPipeline,
    pending: solana_swap_pipeline::PendingSwap,
    cancel: &tokio_util::sync::CancellationToken,
) {
    fn assert_send<T: Send>(_: T) {}
    assert_send(pipeline.submit(pending, cancel));
}

// ---------------------------------------------------------------------------
// Scenario: quote staleness across the user-confirmation boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_quote_is_refused_by_the_build_stage() {
    init_logging();
    let config = PipelineConfig {
        aggregator_base_url: "http://127.0.0.1:0".to_string(),
        rpc_url: "http://127.0.0.1:1".to_string(),
        quote_staleness: Duration::from_millis(1),
        ..PipelineConfig::default()
    };
    let build_client = solana_swap_pipeline::aggregator::SwapBuildClient::new(
        reqwest::Client::new(),
        config.aggregator_base_url.clone(),
        config.quote_staleness,
    );

    let quote = Quote {
        input_mint: WSOL_MINT.parse().unwrap(),
        output_mint: USDC_MINT.parse().unwrap(),
        in_amount: 1_000_000,
        out_amount: 153_420,
        route: vec![],
        price_impact_pct: 0.01,
        raw: serde_json::Value::Null,
        fetched_at: Instant::now(),
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = build_client
        .build_swap_transaction(&quote, &Pubkey::new_unique(), &SwapOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::QuoteExpired { .. }));
    assert_eq!(ErrorReport::from(&err).kind, "quote-expired");
}

// ---------------------------------------------------------------------------
// Live-network checks (run explicitly with --ignored)
// ---------------------------------------------------------------------------

/// Fetches a real SOL -> USDC quote from the public aggregator.
///
/// Run with: cargo test --test pipeline_tests -- --ignored
#[tokio::test]
#[ignore]
async fn live_quote_sol_to_usdc() {
    init_logging();
    let config = PipelineConfig::default();
    let client = solana_swap_pipeline::aggregator::QuoteClient::new(
        reqwest::Client::new(),
        config.aggregator_base_url,
        config.quote_staleness,
    );

    let quote = client
        .get_quote(&swap_request(&Pubkey::new_unique().to_string()))
        .await
        .expect("live quote");
    assert_eq!(quote.in_amount, 1_000_000);
    assert!(quote.out_amount > 0);
    assert!(!quote.route.is_empty());
}
