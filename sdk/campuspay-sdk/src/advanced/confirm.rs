use crate::advanced::submit::PaymentStage;
use crate::config::PaymentConfig;
use crate::core::connection::{FreshnessToken, SolConnection};
use crate::core::device::DeviceClass;
use crate::error::{classify_client_error, classify_transaction_error, PaymentError};
use crate::types::PaymentResult;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::signature::Signature;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Waits for a submitted signature to land. Never returns an error: every outcome is
/// a [`PaymentResult`].
pub struct ConfirmationMonitor<'a> {
    connection: &'a dyn SolConnection,
    config: &'a PaymentConfig,
    device: DeviceClass,
}

impl<'a> ConfirmationMonitor<'a> {
    pub fn new(
        connection: &'a dyn SolConnection,
        config: &'a PaymentConfig,
        device: DeviceClass,
    ) -> Self {
        Self {
            connection,
            config,
            device,
        }
    }

    /// Delay and commitment for each confirmation attempt.
    ///
    /// Desktop: a single `confirmed` wait. Mobile: `confirmed`, then `confirmed` again
    /// after the first backoff, then `finalized` after the second.
    pub fn schedule(&self) -> Vec<(Duration, CommitmentLevel)> {
        match self.device {
            DeviceClass::Desktop => vec![(Duration::ZERO, CommitmentLevel::Confirmed)],
            DeviceClass::Mobile => {
                let (second, last) = self.config.confirm_backoff;
                vec![
                    (Duration::ZERO, CommitmentLevel::Confirmed),
                    (second, CommitmentLevel::Confirmed),
                    (last, CommitmentLevel::Finalized),
                ]
            },
        }
    }

    /// Only failures to observe a result are retried. An on-chain error is final.
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        token: &FreshnessToken,
    ) -> PaymentResult {
        debug!(stage = ?PaymentStage::AwaitingConfirmation, %signature, "awaiting confirmation");

        let mut last_error = PaymentError::Timeout("confirmation was never attempted".to_string());
        for (stage, (delay, commitment)) in self.schedule().into_iter().enumerate() {
            if !delay.is_zero() {
                debug!(%signature, ?delay, "waiting before next confirmation check");
                tokio::time::sleep(delay).await;
            }

            match self
                .connection
                .confirm_transaction(signature, token, commitment)
                .await
            {
                Ok(Ok(())) => {
                    info!(%signature, ?commitment, "transaction confirmed");
                    return PaymentResult::confirmed(*signature);
                },
                Ok(Err(tx_err)) => {
                    error!(%signature, error = %tx_err, "transaction failed on-chain");
                    let error = classify_transaction_error(&tx_err, self.device);
                    return PaymentResult::failed(Some(*signature), error);
                },
                Err(err) => {
                    warn!(%signature, stage, ?commitment, error = %err, "confirmation not observed");
                    last_error = classify_client_error(&err, self.device);
                },
            }
        }

        error!(%signature, error = %last_error, "confirmation failed");
        PaymentResult::failed(Some(*signature), last_error)
    }
}
