use campuspay_sdk::core::signer::WalletError;
use campuspay_sdk::store::{MemoryStore, RecordStore, ReconciliationSink};
use campuspay_sdk::types::{PaymentStatus, RecordStatus, SubmissionPath};
use campuspay_sdk::{DeviceClass, PaymentConfig, PaymentError, PaymentRequest, PaymentSession};
use chrono::Utc;
use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::TransactionError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod common;
use common::{init_tracing, status_recorder, statuses, MockLedger, MockWallet, SOL};

fn vendor_request(amount: rust_decimal::Decimal) -> PaymentRequest {
    PaymentRequest::builder(Pubkey::new_unique().to_string(), amount)
        .with_label("Campus Cafe")
        .with_memo("order 42")
        .build(&PaymentConfig::default())
        .unwrap()
}

#[tokio::test]
async fn test_happy_path_confirms() {
    init_tracing();
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL);

    let store = Arc::new(MemoryStore::new());
    let (seen, listener) = status_recorder();
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_sink(ReconciliationSink::new(store.clone()))
        .with_listener(listener);

    let request = vendor_request(dec!(0.025));
    let outcome = session.execute(&request).await;

    assert!(outcome.result.is_confirmed());
    assert!(outcome.result.signature.is_some());
    assert!(outcome.result.confirmed_at.is_some());
    assert_eq!(outcome.device, DeviceClass::Desktop);
    assert_eq!(outcome.path, Some(SubmissionPath::SignAndSend));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(
        statuses(&seen),
        vec![
            PaymentStatus::Initiating,
            PaymentStatus::Processing,
            PaymentStatus::Confirmed
        ]
    );

    let sent = ledger.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    // transfer + memo on desktop
    assert_eq!(sent[0].message.instructions.len(), 2);
    drop(sent);

    let record = store.get(request.id()).unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Confirmed);
    assert_eq!(record.from_address, wallet.address().to_string());
    assert_eq!(
        record.signature,
        outcome.result.signature.map(|sig| sig.to_string())
    );
    assert_eq!(record.purpose, "Campus Cafe");
}

#[tokio::test]
async fn test_insufficient_funds_never_signs() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL / 10);

    let (seen, listener) = status_recorder();
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_listener(listener);

    let request = vendor_request(dec!(5));
    let outcome = session.execute(&request).await;

    let balance = outcome.balance.unwrap();
    assert!(!balance.sufficient);
    assert_eq!(balance.current_balance, SOL / 10);
    assert_eq!(balance.required, 5 * SOL + 5_000);
    assert_eq!(
        outcome.result.error,
        Some(PaymentError::InsufficientBalance {
            required: 5 * SOL + 5_000,
            available: SOL / 10,
        })
    );
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.blockhash_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        statuses(&seen),
        vec![PaymentStatus::Initiating, PaymentStatus::Failed]
    );

    let err = session.pay(&request).await.unwrap_err();
    assert_eq!(err.shortfall(), Some(5 * SOL + 5_000 - SOL / 10));
}

#[tokio::test(start_paused = true)]
async fn test_mobile_retries_then_succeeds() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(
        MockWallet::sign_only()
            .fail_next(WalletError::Other("Network request failed".into()))
            .fail_next(WalletError::Other("Network request failed".into())),
    );
    ledger.set_balance(wallet.address(), SOL);

    let (seen, listener) = status_recorder();
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_listener(listener);
    assert_eq!(session.device_class(), DeviceClass::Mobile);

    let outcome = session.execute(&vendor_request(dec!(0.025))).await;

    assert!(outcome.result.is_confirmed());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.path, Some(SubmissionPath::SignThenSend));
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 3);
    // a fresh blockhash per attempt
    assert_eq!(ledger.blockhash_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        statuses(&seen),
        vec![
            PaymentStatus::Initiating,
            PaymentStatus::Processing,
            PaymentStatus::Confirmed
        ]
    );

    // mobile transactions leave the memo out
    let sent = ledger.sent.lock().unwrap();
    assert_eq!(sent[0].message.instructions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mobile_gives_up_after_three_attempts() {
    let mut wallet = MockWallet::sign_only();
    for _ in 0..3 {
        wallet = wallet.fail_next(WalletError::Other("Network request failed".into()));
    }
    let wallet = Arc::new(wallet);
    let ledger = MockLedger::new();
    ledger.set_balance(wallet.address(), SOL);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let outcome = session.execute(&vendor_request(dec!(0.025))).await;

    assert_eq!(outcome.result.status, PaymentStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert!(matches!(
        outcome.result.error,
        Some(PaymentError::NetworkError(_))
    ));
    assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_self_payment_rejected_before_network() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());

    let request = PaymentRequest::builder(wallet.address().to_string(), dec!(0.5))
        .build(session.config())
        .unwrap();
    let outcome = session.execute(&request).await;

    assert!(matches!(
        outcome.result.error,
        Some(PaymentError::InvalidAddress(_))
    ));
    assert_eq!(ledger.total_calls(), 0);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnected_wallet() {
    let ledger = MockLedger::new();
    let session = PaymentSession::new(
        ledger.clone(),
        Arc::new(MockWallet::disconnected()),
        PaymentConfig::default(),
    );

    let result = session.pay(&vendor_request(dec!(0.1))).await;

    assert_eq!(result, Err(PaymentError::WalletNotConnected));
    assert_eq!(ledger.total_calls(), 0);
}

#[tokio::test]
async fn test_expired_request_is_not_executed() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL);

    let (seen, listener) = status_recorder();
    let store = Arc::new(MemoryStore::new());
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_sink(ReconciliationSink::new(store.clone()))
        .with_listener(listener);

    let request = PaymentRequest::builder(Pubkey::new_unique().to_string(), dec!(0.1))
        .with_created_at(Utc::now() - chrono::Duration::minutes(20))
        .build(session.config())
        .unwrap();
    let outcome = session.execute(&request).await;

    assert_eq!(outcome.result.status, PaymentStatus::Expired);
    assert_eq!(outcome.result.error, None);
    assert_eq!(ledger.total_calls(), 0);
    assert_eq!(
        statuses(&seen),
        vec![PaymentStatus::Initiating, PaymentStatus::Expired]
    );
    assert_eq!(
        store.get(request.id()).unwrap().unwrap().status,
        RecordStatus::Failed
    );
}

#[tokio::test]
async fn test_user_rejection_is_not_retried() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new().fail_next(WalletError::Rejected));
    ledger.set_balance(wallet.address(), SOL);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_device(DeviceClass::Mobile);
    let outcome = session.execute(&vendor_request(dec!(0.2))).await;

    assert_eq!(outcome.result.error, Some(PaymentError::UserRejected));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_desktop_falls_back_to_sign_then_send() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(
        MockWallet::new().fail_next(WalletError::Other("Network request failed".into())),
    );
    ledger.set_balance(wallet.address(), SOL);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let outcome = session.execute(&vendor_request(dec!(0.2))).await;

    assert!(outcome.result.is_confirmed());
    assert_eq!(outcome.path, Some(SubmissionPath::SignThenSend));
    // each path gets its own transaction
    assert_eq!(outcome.attempts, 2);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 2);
    assert_eq!(ledger.blockhash_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_on_chain_failure_settles_record() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL);
    ledger.script_confirmation(Ok(Err(TransactionError::InsufficientFundsForFee)));

    let store = Arc::new(MemoryStore::new());
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_sink(ReconciliationSink::new(store.clone()));

    let request = vendor_request(dec!(0.3));
    let outcome = session.execute(&request).await;

    assert_eq!(outcome.result.status, PaymentStatus::Failed);
    assert!(matches!(
        outcome.result.error,
        Some(PaymentError::TransactionFailed(_))
    ));
    assert!(outcome.result.signature.is_some());

    let record = store.get(request.id()).unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    assert!(record.signature.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_mobile_confirmation_escalates() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::sign_only());
    ledger.set_balance(wallet.address(), SOL);
    ledger.script_confirmation(Err("request timed out".into()));
    ledger.script_confirmation(Err("request timed out".into()));

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let outcome = session.execute(&vendor_request(dec!(0.05))).await;

    assert!(outcome.result.is_confirmed());
    assert_eq!(ledger.confirm_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_mobile_wallet_with_both_paths_is_asked_three_times() {
    let mut wallet = MockWallet::new();
    for _ in 0..6 {
        wallet = wallet.fail_next(WalletError::Other("Network request failed".into()));
    }
    let wallet = Arc::new(wallet);
    let ledger = MockLedger::new();
    ledger.set_balance(wallet.address(), SOL);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_device(DeviceClass::Mobile);
    let outcome = session.execute(&vendor_request(dec!(0.025))).await;

    assert_eq!(outcome.result.status, PaymentStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.blockhash_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_mobile_attempts_rotate_through_paths() {
    let wallet = Arc::new(
        MockWallet::new()
            .fail_next(WalletError::Other("Network request failed".into()))
            .fail_next(WalletError::Other("Network request failed".into())),
    );
    let ledger = MockLedger::new();
    ledger.set_balance(wallet.address(), SOL);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_device(DeviceClass::Mobile);
    let outcome = session.execute(&vendor_request(dec!(0.025))).await;

    // sign-then-send, sign-and-send, then sign-then-send again
    assert!(outcome.result.is_confirmed());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.path, Some(SubmissionPath::SignThenSend));
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_balance_equal_to_amount_plus_fee_passes() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    let request = vendor_request(dec!(0.025));
    ledger.set_balance(wallet.address(), request.lamports() + 5_000);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let outcome = session.execute(&request).await;

    let balance = outcome.balance.unwrap();
    assert!(balance.sufficient);
    assert_eq!(balance.required, request.lamports() + 5_000);
    assert!(outcome.result.is_confirmed());
}

#[tokio::test]
async fn test_balance_one_lamport_short_fails() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    let request = vendor_request(dec!(0.025));
    ledger.set_balance(wallet.address(), request.lamports() + 4_999);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let outcome = session.execute(&request).await;

    let balance = outcome.balance.unwrap();
    assert!(!balance.sufficient);
    assert_eq!(balance.shortfall(), 1);
    assert_eq!(
        outcome.result.error,
        Some(PaymentError::InsufficientBalance {
            required: request.lamports() + 5_000,
            available: request.lamports() + 4_999,
        })
    );
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_balance_read_blocks_payment() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL);
    ledger.fail_balance_reads();

    let (seen, listener) = status_recorder();
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_listener(listener);
    let request = vendor_request(dec!(0.025));
    let outcome = session.execute(&request).await;

    let balance = outcome.balance.unwrap();
    assert!(!balance.sufficient);
    assert_eq!(balance.current_balance, 0);
    assert_eq!(
        outcome.result.error,
        Some(PaymentError::InsufficientBalance {
            required: request.lamports() + 5_000,
            available: 0,
        })
    );
    assert_eq!(ledger.balance_calls.load(Ordering::SeqCst), 1);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.blockhash_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        statuses(&seen),
        vec![PaymentStatus::Initiating, PaymentStatus::Failed]
    );
}

#[tokio::test]
async fn test_executed_request_is_not_paid_twice() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL);

    let (seen, listener) = status_recorder();
    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default())
        .with_listener(listener);
    let request = vendor_request(dec!(0.025));

    let first = session.execute(&request).await;
    let second = session.execute(&request).await;
    let paid = session.pay(&request).await.unwrap();

    assert!(first.result.is_confirmed());
    assert_eq!(second, first);
    assert_eq!(paid, first.result);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.send_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.balance_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        statuses(&seen),
        vec![
            PaymentStatus::Initiating,
            PaymentStatus::Processing,
            PaymentStatus::Confirmed
        ]
    );
}

#[tokio::test]
async fn test_request_stopped_before_signing_can_be_retried() {
    let ledger = MockLedger::new();
    let wallet = Arc::new(MockWallet::new());
    ledger.set_balance(wallet.address(), SOL / 100);

    let session = PaymentSession::new(ledger.clone(), wallet.clone(), PaymentConfig::default());
    let request = vendor_request(dec!(0.025));

    let first = session.execute(&request).await;
    assert!(matches!(
        first.result.error,
        Some(PaymentError::InsufficientBalance { .. })
    ));

    ledger.set_balance(wallet.address(), SOL);
    let second = session.execute(&request).await;

    assert!(second.result.is_confirmed());
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
}
