//! End-to-end pipeline tests over mock ports: admission, the state machine,
//! refund routing and reporting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use ton_burn_relayer::app::{
    BurnConfig, BurnExecutor, MetricsConfig, MetricsService, ProcessorConfig, RefundConfig,
    RefundHandler, RelayerService, SwapConfig, SwapExecutor,
};
use ton_burn_relayer::domain::{
    CandidateTransaction, LedgerStore, ProcessPaymentRequest, TonAddress, TransactionRecord,
    TransactionStatus,
};
use ton_burn_relayer::infra::ton::messages::OutboundBody;
use ton_burn_relayer::test_utils::{MockLedger, MockNotifier, MockSource, MockVenue, MockWallet};
use ton_burn_relayer::util::PollSchedule;

const NANOTON: i64 = 1_000_000_000;

fn subscription_contract() -> TonAddress {
    TonAddress::new(0, [0xEE; 32])
}

fn user() -> TonAddress {
    TonAddress::new(0, [0x11; 32])
}

fn candidate(lt: i64, amount_nanotons: i64) -> CandidateTransaction {
    CandidateTransaction {
        lt,
        hash: format!("hash-{lt}"),
        from_address: subscription_contract().to_string(),
        to_address: TonAddress::new(0, [0xAB; 32]).to_string(),
        value_nanotons: amount_nanotons,
        user_address: user().to_string(),
        body: None,
    }
}

struct Harness {
    ledger: Arc<MockLedger>,
    wallet: Arc<MockWallet>,
    #[allow(dead_code)]
    venue: Arc<MockVenue>,
    notifier: Arc<MockNotifier>,
    metrics: Arc<MetricsService>,
    service: RelayerService,
}

fn build(
    candidates: Vec<CandidateTransaction>,
    ton_reserve: i64,
    jetton_reserve: i64,
) -> Harness {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let venue = Arc::new(MockVenue::with_reserves(ton_reserve, jetton_reserve));
    let source = Arc::new(MockSource::new(candidates));
    let notifier = Arc::new(MockNotifier::new());
    let metrics = Arc::new(MetricsService::new(MetricsConfig::default()));

    let swap_config = SwapConfig {
        balance_poll: PollSchedule::fixed(3, Duration::from_millis(1)),
        ..SwapConfig::default()
    };
    let swap = SwapExecutor::new(
        Arc::clone(&venue) as _,
        Arc::clone(&wallet) as _,
        swap_config,
    );
    let burn = BurnExecutor::new(Arc::clone(&wallet) as _, BurnConfig::default());
    let refund = RefundHandler::new(
        Arc::clone(&wallet) as _,
        RefundConfig {
            subscription_contract: subscription_contract(),
            gas_for_callback: 10_000_000,
        },
    );

    let service = RelayerService::new(
        Arc::clone(&ledger) as _,
        Arc::clone(&wallet) as _,
        source as _,
        swap,
        burn,
        refund,
        Arc::clone(&notifier) as _,
        Arc::clone(&metrics),
        ProcessorConfig::new(subscription_contract()),
    );

    Harness {
        ledger,
        wallet,
        venue,
        notifier,
        metrics,
        service,
    }
}

async fn record_for(h: &Harness, lt: i64) -> TransactionRecord {
    h.ledger
        .find_by_key(lt, &format!("hash-{lt}"))
        .await
        .unwrap()
        .expect("record missing")
}

fn callback_count(h: &Harness) -> usize {
    h.wallet
        .sent_bodies()
        .iter()
        .filter(|b| matches!(b, OutboundBody::SwapCallback { .. }))
        .count()
}

#[tokio::test]
async fn scenario_a_swap_and_burn_complete() {
    // 1.0 TON in, 0.2 reserved for gas, swap yields 72 jetton units.
    let h = build(vec![candidate(1, NANOTON)], 100 * NANOTON, 9_000 * NANOTON);
    h.wallet.set_jetton_balance(1_000);
    h.wallet.set_jetton_balance_after_send(1_072);

    let admitted = h.service.process_new_transactions().await.unwrap();
    assert_eq!(admitted, 1);

    let record = record_for(&h, 1).await;
    assert_eq!(record.status, TransactionStatus::Completed);
    assert_eq!(record.jetton_amount, Some(72));
    assert!(record.error_message.is_none());
    assert!(record.processed_at.is_some());
    assert_eq!(record.retry_count, 0);

    // swap -> burn -> callback, in that order
    let bodies = h.wallet.sent_bodies();
    assert_eq!(bodies.len(), 3);
    assert!(matches!(bodies[0], OutboundBody::Swap { offer_nanotons, .. } if offer_nanotons == 800_000_000));
    assert!(matches!(bodies[1], OutboundBody::JettonBurn { amount, .. } if amount == 72));
    match &bodies[2] {
        OutboundBody::SwapCallback {
            user: u,
            jetton_amount,
            success,
        } => {
            assert_eq!(u, &user());
            assert_eq!(*jetton_amount, 72);
            assert!(*success);
        }
        other => panic!("expected callback, got {:?}", other),
    }
    assert_eq!(callback_count(&h), 1);

    let notifications = h.notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].success);
    assert_eq!(notifications[0].jetton_amount.as_deref(), Some("72"));

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.total_transactions, 1);
    assert_eq!(snapshot.successful_transactions, 1);
}

#[tokio::test]
async fn scenario_b_amount_below_gas_reserve_fails_with_zero_sends() {
    // 0.1 TON in, 0.2 gas reserve: nothing to swap.
    let h = build(
        vec![candidate(2, NANOTON / 10)],
        100 * NANOTON,
        9_000 * NANOTON,
    );

    h.service.process_new_transactions().await.unwrap();

    let record = record_for(&h, 2).await;
    assert_eq!(record.status, TransactionStatus::Failed);
    assert!(
        record
            .error_message
            .as_deref()
            .unwrap()
            .contains("Insufficient amount for gas")
    );
    assert!(h.wallet.sends().is_empty());
    assert_eq!(record.retry_count, 0);
}

#[tokio::test]
async fn scenario_c_liquidity_precondition_failure_refunds_full_amount() {
    // Swap input (0.8 TON) exceeds 10% of a 1 TON pool reserve.
    let h = build(vec![candidate(3, NANOTON)], NANOTON, 9_000 * NANOTON);

    h.service.process_new_transactions().await.unwrap();

    let record = record_for(&h, 3).await;
    assert_eq!(record.status, TransactionStatus::Refunded);
    assert!(record.error_message.as_deref().unwrap().contains("Swap failed"));
    assert_eq!(record.retry_count, 0);

    // Conservation: exactly one send, refunding the full original amount.
    let sends = h.wallet.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].value_nanotons, NANOTON);
    assert_eq!(sends[0].dest, subscription_contract());
    match OutboundBody::decode(&sends[0].body).unwrap() {
        OutboundBody::RefundUser {
            user: u,
            amount_nanotons,
        } => {
            assert_eq!(u, user());
            assert_eq!(amount_nanotons, NANOTON);
        }
        other => panic!("expected refund, got {:?}", other),
    }

    let notifications = h.notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(!notifications[0].success);
}

#[tokio::test]
async fn scenario_d_burn_failure_with_refund_shortfall_fails_with_both_messages() {
    let h = build(vec![candidate(4, NANOTON)], 100 * NANOTON, 9_000 * NANOTON);
    h.wallet.set_jetton_balance(1_000);
    h.wallet.set_jetton_balance_after_send(1_072);
    // Swap send succeeds, everything after is rejected.
    h.wallet.fail_sends_after(1);
    // Balance cannot cover the 1.0 TON refund plus gas.
    h.wallet.set_balance(NANOTON / 2);

    h.service.process_new_transactions().await.unwrap();

    let record = record_for(&h, 4).await;
    assert_eq!(record.status, TransactionStatus::Failed);
    let error = record.error_message.as_deref().unwrap();
    assert!(error.contains("Burn failed"));
    assert!(error.contains("Insufficient balance for refund"));

    // Only the swap message went out; the refund was blocked by the
    // precondition before any send.
    assert_eq!(h.wallet.sends().len(), 1);
    assert_eq!(callback_count(&h), 0);
}

#[tokio::test]
async fn test_idempotent_admission_across_batches() {
    let h = build(vec![candidate(5, NANOTON)], 100 * NANOTON, 9_000 * NANOTON);
    h.wallet.set_jetton_balance(1_000);
    h.wallet.set_jetton_balance_after_send(1_072);

    let first = h.service.process_new_transactions().await.unwrap();
    assert_eq!(first, 1);
    let sends_after_first = h.wallet.sends().len();

    // The same transaction observed again by later polls: admitted zero
    // times, no further sends.
    for _ in 0..3 {
        let admitted = h.service.process_new_transactions().await.unwrap();
        assert_eq!(admitted, 0);
    }

    assert_eq!(h.ledger.all_records().len(), 1);
    assert_eq!(h.wallet.sends().len(), sends_after_first);
}

#[tokio::test]
async fn test_processing_record_from_prior_run_left_untouched() {
    let h = build(vec![candidate(6, NANOTON)], 100 * NANOTON, 9_000 * NANOTON);

    // A record claimed by a previous run is still in flight.
    let now = Utc::now();
    h.ledger.seed(TransactionRecord {
        id: Uuid::new_v4(),
        lt: 6,
        hash: "hash-6".to_string(),
        user_address: user().to_string(),
        from_address: subscription_contract().to_string(),
        to_address: TonAddress::new(0, [0xAB; 32]).to_string(),
        amount_nanotons: NANOTON,
        jetton_amount: None,
        status: TransactionStatus::Processing,
        error_message: None,
        retry_count: 0,
        processed_at: None,
        created_at: now,
        updated_at: now,
    });

    let admitted = h.service.process_new_transactions().await.unwrap();
    assert_eq!(admitted, 0);
    assert!(h.wallet.sends().is_empty());

    let record = record_for(&h, 6).await;
    assert_eq!(record.status, TransactionStatus::Processing);
}

#[tokio::test]
async fn test_terminal_record_never_revisited() {
    let h = build(vec![candidate(7, NANOTON)], 100 * NANOTON, 9_000 * NANOTON);

    let now = Utc::now();
    h.ledger.seed(TransactionRecord {
        id: Uuid::new_v4(),
        lt: 7,
        hash: "hash-7".to_string(),
        user_address: user().to_string(),
        from_address: subscription_contract().to_string(),
        to_address: TonAddress::new(0, [0xAB; 32]).to_string(),
        amount_nanotons: NANOTON,
        jetton_amount: Some(72),
        status: TransactionStatus::Completed,
        error_message: None,
        retry_count: 0,
        processed_at: Some(now),
        created_at: now,
        updated_at: now,
    });

    h.service.process_new_transactions().await.unwrap();
    assert!(h.wallet.sends().is_empty());
    assert_eq!(record_for(&h, 7).await.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_failed_refund_after_swap_failure_marks_failed() {
    // Swap precondition fails and the refund send itself is rejected.
    let h = build(vec![candidate(8, NANOTON)], NANOTON, 9_000 * NANOTON);
    h.wallet.fail_sends_after(0);

    h.service.process_new_transactions().await.unwrap();

    let record = record_for(&h, 8).await;
    assert_eq!(record.status, TransactionStatus::Failed);
    let error = record.error_message.as_deref().unwrap();
    assert!(error.contains("Swap failed"));
    assert!(error.contains("Refund failed"));
}

#[tokio::test]
async fn test_backend_notifier_failure_does_not_change_outcome() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let venue = Arc::new(MockVenue::with_reserves(100 * NANOTON, 9_000 * NANOTON));
    let source = Arc::new(MockSource::new(vec![candidate(9, NANOTON)]));
    let notifier = Arc::new(MockNotifier::failing("backend down"));
    let metrics = Arc::new(MetricsService::new(MetricsConfig::default()));

    wallet.set_jetton_balance(1_000);
    wallet.set_jetton_balance_after_send(1_072);

    let swap_config = SwapConfig {
        balance_poll: PollSchedule::fixed(3, Duration::from_millis(1)),
        ..SwapConfig::default()
    };
    let service = RelayerService::new(
        Arc::clone(&ledger) as _,
        Arc::clone(&wallet) as _,
        source as _,
        SwapExecutor::new(Arc::clone(&venue) as _, Arc::clone(&wallet) as _, swap_config),
        BurnExecutor::new(Arc::clone(&wallet) as _, BurnConfig::default()),
        RefundHandler::new(
            Arc::clone(&wallet) as _,
            RefundConfig {
                subscription_contract: subscription_contract(),
                gas_for_callback: 10_000_000,
            },
        ),
        Arc::clone(&notifier) as _,
        metrics,
        ProcessorConfig::new(subscription_contract()),
    );

    service.process_new_transactions().await.unwrap();

    let record = ledger
        .find_by_key(9, "hash-9")
        .await
        .unwrap()
        .expect("record missing");
    assert_eq!(record.status, TransactionStatus::Completed);
    assert_eq!(notifier.notifications().len(), 1);
}

#[tokio::test]
async fn test_process_payment_runs_pipeline_and_dedupes() {
    let h = build(vec![], 100 * NANOTON, 9_000 * NANOTON);
    h.wallet.set_jetton_balance(1_000);
    h.wallet.set_jetton_balance_after_send(1_072);

    let request = ProcessPaymentRequest {
        user_address: user().to_string(),
        lt: 77,
        tx_hash: "manual-hash".to_string(),
        amount_nanotons: NANOTON,
        subscription_contract_address: subscription_contract().to_string(),
    };

    let response = h.service.process_payment(&request).await.unwrap();
    assert!(response.success);
    assert!(!response.tx_id.is_empty());

    let record = h
        .ledger
        .find_by_key(77, "manual-hash")
        .await
        .unwrap()
        .expect("record missing");
    assert_eq!(record.status, TransactionStatus::Completed);

    // Second submission of the same payment is never reprocessed.
    let sends_before = h.wallet.sends().len();
    let duplicate = h.service.process_payment(&request).await.unwrap();
    assert!(!duplicate.success);
    assert!(duplicate.message.contains("already known"));
    assert_eq!(h.wallet.sends().len(), sends_before);
}

#[tokio::test]
async fn test_process_payment_rejects_invalid_request() {
    let h = build(vec![], 100 * NANOTON, 9_000 * NANOTON);

    let request = ProcessPaymentRequest {
        user_address: String::new(),
        lt: 1,
        tx_hash: "h".to_string(),
        amount_nanotons: NANOTON,
        subscription_contract_address: subscription_contract().to_string(),
    };

    assert!(h.service.process_payment(&request).await.is_err());
    assert!(h.wallet.sends().is_empty());
}
