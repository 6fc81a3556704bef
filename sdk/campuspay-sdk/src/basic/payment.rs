use crate::advanced::confirm::ConfirmationMonitor;
use crate::advanced::submit::SubmissionStrategy;
use crate::advanced::watcher::PaymentMatchWatcher;
use crate::basic::balance::check_balance;
use crate::basic::request::PaymentRequest;
use crate::config::PaymentConfig;
use crate::core::connection::SolConnection;
use crate::core::device::{ClientHints, DeviceClass};
use crate::core::signer::WalletSigner;
use crate::error::{PaymentError, Result};
use crate::status::{StatusListener, StatusTracker};
use crate::store::ReconciliationSink;
use crate::types::{BalanceCheck, PaymentResult, PaymentStatus, SubmissionPath};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Everything known about one executed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub result: PaymentResult,
    /// Signing attempts made (0 when the payment stopped before signing).
    pub attempts: u32,
    /// Path that got the transaction accepted.
    pub path: Option<SubmissionPath>,
    pub device: DeviceClass,
    /// Balance gate result, when the gate ran.
    pub balance: Option<BalanceCheck>,
}

/// A payer session: the connected signing agent plus the network it pays on.
///
/// Runs request → balance gate → constructor → signing/submission → confirmation,
/// reporting every status transition to listeners and the reconciliation sink.
///
/// A request is consumed once it reaches the signing agent: executing it again returns
/// the recorded outcome without touching the wallet or the network.
pub struct PaymentSession {
    connection: Arc<dyn SolConnection>,
    wallet: Arc<dyn WalletSigner>,
    config: PaymentConfig,
    hints: ClientHints,
    device: Option<DeviceClass>,
    sink: Option<ReconciliationSink>,
    listeners: Vec<Arc<dyn StatusListener>>,
    /// Request id to outcome; `None` while the payment is in flight.
    consumed: Mutex<HashMap<String, Option<PaymentOutcome>>>,
}

enum Claim {
    Fresh,
    InFlight,
    Settled(PaymentOutcome),
}

impl PaymentSession {
    pub fn new(
        connection: Arc<dyn SolConnection>,
        wallet: Arc<dyn WalletSigner>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            connection,
            wallet,
            config,
            hints: ClientHints::default(),
            device: None,
            sink: None,
            listeners: Vec::new(),
            consumed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_hints(mut self, hints: ClientHints) -> Self {
        self.hints = hints;
        self
    }

    /// Skip detection and use `device` for every payment.
    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_sink(mut self, sink: ReconciliationSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device
            .unwrap_or_else(|| DeviceClass::detect(&self.hints, self.wallet.capabilities()))
    }

    fn listeners(&self) -> Vec<Arc<dyn StatusListener>> {
        let mut listeners = self.listeners.clone();
        if let Some(sink) = &self.sink {
            listeners.push(Arc::new(sink.clone()));
        }
        listeners
    }

    /// A watcher on the same network, reporting to the same listeners and sink.
    pub fn watcher(&self) -> PaymentMatchWatcher {
        let mut watcher = PaymentMatchWatcher::new(self.connection.clone(), self.config.clone());
        if let Some(sink) = &self.sink {
            watcher = watcher.with_sink(sink.clone());
        }
        for listener in &self.listeners {
            watcher = watcher.with_listener(listener.clone());
        }
        watcher
    }

    /// Execute `request` from the connected wallet.
    ///
    /// Never returns an error: failures are carried in [`PaymentOutcome::result`].
    /// Wallet, expiry and self-payment checks run before any network call.
    pub async fn execute(&self, request: &PaymentRequest) -> PaymentOutcome {
        let device = self.device_class();
        match self.claim(request.id()) {
            Claim::Fresh => {},
            Claim::Settled(prior) => {
                info!(request_id = request.id(), status = %prior.result.status, "request already executed");
                return prior;
            },
            Claim::InFlight => {
                warn!(request_id = request.id(), "request is already being paid");
                return PaymentOutcome {
                    result: PaymentResult::failed(
                        None,
                        PaymentError::TransactionFailed("payment already in progress".to_string()),
                    ),
                    attempts: 0,
                    path: None,
                    device,
                    balance: None,
                };
            },
        }

        let outcome = self.run(request, device).await;
        self.release(request.id(), &outcome);
        outcome
    }

    fn claim(&self, id: &str) -> Claim {
        let mut consumed = self.consumed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match consumed.get(id) {
            Some(Some(prior)) => Claim::Settled(prior.clone()),
            Some(None) => Claim::InFlight,
            None => {
                consumed.insert(id.to_string(), None);
                Claim::Fresh
            },
        }
    }

    /// Keep the outcome of a request that reached the wallet; free the id otherwise so
    /// a payer can retry after topping up or reconnecting.
    fn release(&self, id: &str, outcome: &PaymentOutcome) {
        let mut consumed = self.consumed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if outcome.attempts > 0 {
            consumed.insert(id.to_string(), Some(outcome.clone()));
        } else {
            consumed.remove(id);
        }
    }

    async fn run(&self, request: &PaymentRequest, device: DeviceClass) -> PaymentOutcome {
        let mut tracker = StatusTracker::new(request.id(), self.listeners());
        let mut outcome = PaymentOutcome {
            result: PaymentResult::failed(None, PaymentError::WalletNotConnected),
            attempts: 0,
            path: None,
            device,
            balance: None,
        };

        tracker.advance(tracker.update(PaymentStatus::Initiating));
        let payer = self.wallet.pubkey();
        self.open_record(request, payer.as_ref());

        let Some(payer) = payer else {
            return finish(&mut tracker, outcome, None);
        };
        if request.is_expired() {
            outcome.result = PaymentResult::expired(None);
            return finish(&mut tracker, outcome, Some(payer));
        }
        if *request.recipient() == payer {
            outcome.result = PaymentResult::failed(
                None,
                PaymentError::InvalidAddress("cannot send a payment to your own address".to_string()),
            );
            return finish(&mut tracker, outcome, Some(payer));
        }

        let balance = check_balance(
            self.connection.as_ref(),
            &payer,
            request.lamports(),
            self.config.estimated_fee_lamports,
        )
        .await;
        outcome.balance = Some(balance);
        if !balance.sufficient {
            outcome.result = PaymentResult::failed(
                None,
                PaymentError::InsufficientBalance {
                    required: balance.required,
                    available: balance.current_balance,
                },
            );
            return finish(&mut tracker, outcome, Some(payer));
        }

        tracker.advance(tracker.update(PaymentStatus::Processing));

        let strategy = SubmissionStrategy::new(
            self.connection.as_ref(),
            self.wallet.as_ref(),
            &self.config,
            device,
        );
        let submission = match strategy.submit(request).await {
            Ok(submission) => submission,
            Err(failure) => {
                outcome.attempts = failure.attempts;
                outcome.result = PaymentResult::failed(None, failure.error);
                return finish(&mut tracker, outcome, Some(payer));
            },
        };
        outcome.attempts = submission.attempts;
        outcome.path = Some(submission.path);

        let monitor = ConfirmationMonitor::new(self.connection.as_ref(), &self.config, device);
        outcome.result = monitor
            .await_confirmation(&submission.signature, &submission.token)
            .await;
        finish(&mut tracker, outcome, Some(payer))
    }

    /// [`Self::execute`] reduced to the confirmed result or the failure category.
    pub async fn pay(&self, request: &PaymentRequest) -> Result<PaymentResult> {
        let outcome = self.execute(request).await;
        match outcome.result.status {
            PaymentStatus::Confirmed => Ok(outcome.result),
            PaymentStatus::Expired => Err(PaymentError::Timeout(
                "payment request expired".to_string(),
            )),
            _ => Err(outcome.result.error.unwrap_or_else(|| {
                PaymentError::TransactionFailed("payment did not complete".to_string())
            })),
        }
    }

    fn open_record(&self, request: &PaymentRequest, payer: Option<&Pubkey>) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.open(request, payer) {
                warn!(request_id = request.id(), error = %err, "failed to open transaction record");
            }
        }
    }
}

fn finish(
    tracker: &mut StatusTracker,
    outcome: PaymentOutcome,
    payer: Option<Pubkey>,
) -> PaymentOutcome {
    let mut update = tracker.update(outcome.result.status);
    update.signature = outcome.result.signature;
    update.payer = payer;
    update.error = outcome.result.error.clone();
    tracker.advance(update);

    info!(
        status = %outcome.result.status,
        attempts = outcome.attempts,
        device = %outcome.device,
        "payment finished"
    );
    outcome
}
