//! Payment-match watcher for scan-to-pay flows.
//!
//! The payer's session never reports back, so the watcher polls the signature history
//! of the request's reference key and inspects each new transaction for a credit to the
//! recipient close enough to the requested amount.

use crate::basic::request::PaymentRequest;
use crate::config::PaymentConfig;
use crate::core::connection::SolConnection;
use crate::error::{PaymentError, Result};
use crate::status::{StatusListener, StatusTracker};
use crate::store::ReconciliationSink;
use crate::types::PaymentStatus;
use chrono::Utc;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a watch ended. A cancelled watch has no outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Matched {
        signature: Signature,
        payer: Option<Pubkey>,
    },
    Expired,
}

/// `|observed - expected| <= tolerance * expected`, boundary inclusive.
pub fn within_tolerance(observed: i128, expected: u64, tolerance: Decimal) -> bool {
    let diff = (observed - expected as i128).abs();
    let Ok(diff) = Decimal::try_from_i128_with_scale(diff, 0) else {
        return false;
    };
    diff <= tolerance * Decimal::from(expected)
}

#[derive(Clone)]
pub struct PaymentMatchWatcher {
    connection: Arc<dyn SolConnection>,
    config: PaymentConfig,
    sink: Option<ReconciliationSink>,
    listeners: Vec<Arc<dyn StatusListener>>,
}

impl PaymentMatchWatcher {
    pub fn new(connection: Arc<dyn SolConnection>, config: PaymentConfig) -> Self {
        Self {
            connection,
            config,
            sink: None,
            listeners: Vec::new(),
        }
    }

    /// Open a record for each watched request and settle it on the outcome.
    pub fn with_sink(mut self, sink: ReconciliationSink) -> Self {
        self.listeners.push(Arc::new(sink.clone()));
        self.sink = Some(sink);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Poll until the payment shows up, the request expires, or `cancel` fires.
    ///
    /// The deadline is also raced against each poll, so a stalled RPC call cannot
    /// hold the watch past the request's TTL.
    ///
    /// Returns `Ok(None)` when cancelled; no status is emitted after cancellation.
    pub async fn watch(
        &self,
        request: &PaymentRequest,
        cancel: CancellationToken,
    ) -> Result<Option<WatchOutcome>> {
        let reference = *request.reference().ok_or_else(|| {
            PaymentError::InvalidAddress("payment request has no reference key".to_string())
        })?;

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.open(request, None) {
                warn!(request_id = request.id(), error = %err, "failed to open transaction record");
            }
        }

        let mut tracker = StatusTracker::new(request.id(), self.listeners.clone());
        tracker.advance(tracker.update(PaymentStatus::Processing));

        let deadline = Instant::now() + request.remaining_ttl(Utc::now());
        let mut interval = tokio::time::interval(self.config.watch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seen = HashSet::new();

        info!(
            request_id = request.id(),
            %reference,
            recipient = %request.recipient(),
            lamports = request.lamports(),
            "watching for payment"
        );

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(request_id = request.id(), "watch cancelled");
                    return Ok(None);
                }
                _ = tokio::time::sleep_until(deadline) => break WatchOutcome::Expired,
                _ = interval.tick() => {}
            }

            let found = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(request_id = request.id(), "watch cancelled during poll");
                    return Ok(None);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(request_id = request.id(), "poll still running at the deadline");
                    break WatchOutcome::Expired;
                }
                found = self.poll(request, &reference, &mut seen) => found,
            };
            if let Some((signature, payer)) = found {
                break WatchOutcome::Matched { signature, payer };
            }
        };

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let update = match &outcome {
            WatchOutcome::Matched { signature, payer } => {
                info!(request_id = request.id(), %signature, "payment matched");
                let mut update = tracker.update(PaymentStatus::Confirmed);
                update.signature = Some(*signature);
                update.payer = *payer;
                update
            },
            WatchOutcome::Expired => {
                info!(request_id = request.id(), "payment request expired before a match");
                tracker.update(PaymentStatus::Expired)
            },
        };
        tracker.advance(update);
        Ok(Some(outcome))
    }

    /// One pass over the reference's recent signatures.
    async fn poll(
        &self,
        request: &PaymentRequest,
        reference: &Pubkey,
        seen: &mut HashSet<Signature>,
    ) -> Option<(Signature, Option<Pubkey>)> {
        let signatures = match self
            .connection
            .get_signatures_for_address(reference, self.config.watch_signature_limit)
            .await
        {
            Ok(signatures) => signatures,
            Err(err) => {
                warn!(request_id = request.id(), error = %err, "signature poll failed");
                return None;
            },
        };
        debug!(request_id = request.id(), count = signatures.len(), "polled reference");

        for info in signatures {
            if seen.contains(&info.signature) {
                continue;
            }
            if let Some(err) = &info.err {
                debug!(signature = %info.signature, error = %err, "skipping failed transaction");
                seen.insert(info.signature);
                continue;
            }

            let detail = match self.connection.get_transaction_detail(&info.signature).await {
                Ok(Some(detail)) => detail,
                Ok(None) => {
                    debug!(signature = %info.signature, "transaction detail not yet available");
                    continue;
                },
                Err(err) => {
                    warn!(signature = %info.signature, error = %err, "failed to fetch transaction");
                    continue;
                },
            };
            seen.insert(info.signature);

            if detail.err.is_some() {
                continue;
            }
            let Some(delta) = detail.balance_delta(request.recipient()) else {
                debug!(signature = %info.signature, "recipient not in transaction");
                continue;
            };
            if within_tolerance(delta, request.lamports(), self.config.match_tolerance) {
                return Some((info.signature, detail.account_keys.first().copied()));
            }
            debug!(
                signature = %info.signature,
                delta,
                expected = request.lamports(),
                "amount outside tolerance"
            );
        }
        None
    }

    /// Run [`Self::watch`] on a background task.
    pub fn spawn(&self, request: PaymentRequest) -> Result<WatchHandle> {
        if request.reference().is_none() {
            return Err(PaymentError::InvalidAddress(
                "payment request has no reference key".to_string(),
            ));
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let watcher = self.clone();
        let task = tokio::spawn(async move { watcher.watch(&request, child).await });
        Ok(WatchHandle { token, task })
    }
}

/// Handle to a spawned watch.
pub struct WatchHandle {
    token: CancellationToken,
    task: JoinHandle<Result<Option<WatchOutcome>>>,
}

impl WatchHandle {
    /// Stop polling. No further status is emitted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this watch, for callers that hand [`Self::join`] elsewhere.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watch to end. `None` when it was cancelled.
    pub async fn join(self) -> Option<WatchOutcome> {
        match self.task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(error = %err, "watch failed");
                None
            },
            Err(err) => {
                warn!(error = %err, "watch task aborted");
                None
            },
        }
    }
}
