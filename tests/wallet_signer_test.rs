//! Wallet signer tests: serialized seqno use, bounded confirmation waits and
//! initialization behavior.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;

use ton_burn_relayer::domain::{AppError, ChainError, TonAddress, WalletGateway};
use ton_burn_relayer::infra::ton::wallet::{WalletConfig, WalletSigner};
use ton_burn_relayer::test_utils::MockRpcProvider;
use ton_burn_relayer::util::PollSchedule;

fn jetton_master() -> TonAddress {
    TonAddress::new(0, [0xCD; 32])
}

fn fast_config(address: TonAddress) -> WalletConfig {
    let mut config = WalletConfig::new(address, jetton_master(), 10_000_000);
    config.seqno_poll = PollSchedule::fixed(5, Duration::from_millis(1));
    config.init_retry = PollSchedule::fixed(2, Duration::from_millis(1));
    config
}

fn signer_with(provider: Arc<MockRpcProvider>) -> WalletSigner {
    let key = SigningKey::from_bytes(&[5u8; 32]);
    let address = WalletSigner::derive_address(&key);
    WalletSigner::new(provider as _, key, fast_config(address))
}

fn seqno_of(boc: &str) -> u32 {
    let bytes = BASE64.decode(boc).unwrap();
    u32::from_be_bytes([bytes[64], bytes[65], bytes[66], bytes[67]])
}

#[tokio::test]
async fn test_sends_use_strictly_increasing_seqnos() {
    let provider = Arc::new(MockRpcProvider::new());
    let signer = Arc::new(signer_with(Arc::clone(&provider)));

    let mut handles = Vec::new();
    for i in 0..5u8 {
        let signer = Arc::clone(&signer);
        handles.push(tokio::spawn(async move {
            signer
                .send(&TonAddress::new(0, [i; 32]), 1_000, vec![i])
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let confirmation = handle.await.unwrap();
        assert!(confirmation.confirmed);
    }

    // Submission order fixes seqno order: no gaps, no repeats.
    let seqnos: Vec<u32> = provider.sent_bocs().iter().map(|b| seqno_of(b)).collect();
    assert_eq!(seqnos, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_unconfirmed_send_releases_lock_and_reports_unconfirmed() {
    let provider = Arc::new(MockRpcProvider::new());
    provider.freeze_seqno();
    let signer = signer_with(Arc::clone(&provider));

    let first = signer
        .send(&TonAddress::new(0, [1; 32]), 1_000, vec![])
        .await
        .unwrap();
    assert!(!first.confirmed);

    // The lock must not be held past the bounded wait: a second send still
    // goes through.
    let second = signer
        .send(&TonAddress::new(0, [2; 32]), 1_000, vec![])
        .await
        .unwrap();
    assert!(!second.confirmed);
    assert_eq!(provider.sent_bocs().len(), 2);
}

#[tokio::test]
async fn test_insufficient_balance_blocks_send() {
    let provider = Arc::new(MockRpcProvider::new());
    provider.set_balance(1_000);
    let signer = signer_with(Arc::clone(&provider));

    let err = signer
        .send(&TonAddress::new(0, [1; 32]), 1_000_000_000, vec![])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Chain(ChainError::InsufficientFunds)
    ));
    assert!(provider.sent_bocs().is_empty());
}

#[tokio::test]
async fn test_initialization_rejects_address_mismatch() {
    let provider = Arc::new(MockRpcProvider::new());
    let key = SigningKey::from_bytes(&[5u8; 32]);
    // Configured address does not belong to this key.
    let wrong = TonAddress::new(0, [0x99; 32]);
    let signer = WalletSigner::new(provider as _, key, fast_config(wrong));

    let err = signer.ensure_initialized().await.unwrap_err();
    assert!(matches!(err, AppError::Chain(ChainError::WalletInit(_))));
}

#[tokio::test]
async fn test_concurrent_initialization_shares_one_attempt() {
    let provider = Arc::new(MockRpcProvider::new());
    let signer = Arc::new(signer_with(provider));

    let a = Arc::clone(&signer);
    let b = Arc::clone(&signer);
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.ensure_initialized().await }),
        tokio::spawn(async move { b.ensure_initialized().await }),
    );
    assert!(ra.unwrap().is_ok());
    assert!(rb.unwrap().is_ok());
}

#[tokio::test]
async fn test_jetton_balance_reads_resolved_jetton_wallet() {
    let jetton_wallet = TonAddress::new(0, [0x42; 32]);
    let provider = Arc::new(
        MockRpcProvider::new()
            .with_get_method_address("get_wallet_address", &jetton_wallet)
            .with_get_method_ints("get_wallet_data", vec![1_234]),
    );
    let signer = signer_with(provider);

    assert_eq!(signer.jetton_wallet_address().await.unwrap(), jetton_wallet);
    assert_eq!(signer.jetton_balance().await.unwrap(), 1_234);
}
