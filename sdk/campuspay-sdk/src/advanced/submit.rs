//! Signing & submission strategy.
//!
//! Every request sent to the wallet is one attempt, and every attempt signs a fresh
//! transaction with a newly fetched blockhash. Mobile sessions get
//! `PaymentConfig::mobile_sign_attempts` attempts, rotating through the advertised
//! paths in preference order. Desktop sessions try each advertised path once, with no
//! retry of a path that already failed.

use crate::basic::request::PaymentRequest;
use crate::basic::transfer::{build_transfer, enforce_transaction_check};
use crate::config::PaymentConfig;
use crate::core::connection::{FreshnessToken, SendOptions, SolConnection};
use crate::core::device::DeviceClass;
use crate::core::signer::{WalletCapabilities, WalletError, WalletSigner};
use crate::error::{classify_client_error, classify_wallet_error, PaymentError};
use crate::types::SubmissionPath;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Engine stages, logged as the attempt progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStage {
    Constructing,
    Signing,
    Submitting,
    AwaitingConfirmation,
}

/// A transaction the network accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub signature: Signature,
    pub token: FreshnessToken,
    pub path: SubmissionPath,
    pub attempts: u32,
}

/// Terminal submission failure, always one of the taxonomy categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    pub error: PaymentError,
    pub attempts: u32,
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempt(s)", self.error, self.attempts)
    }
}

impl std::error::Error for SubmissionFailure {}

impl From<SubmissionFailure> for PaymentError {
    fn from(failure: SubmissionFailure) -> Self {
        failure.error
    }
}

/// Order in which submission paths are tried.
///
/// Desktop prefers the single-call path. Mobile prefers signing alone and
/// broadcasting directly, because combined calls through mobile agents are the
/// least reliable path.
pub fn path_order(capabilities: WalletCapabilities, device: DeviceClass) -> Vec<SubmissionPath> {
    let mut paths = Vec::with_capacity(2);
    match device {
        DeviceClass::Desktop => {
            if capabilities.can_sign_and_send {
                paths.push(SubmissionPath::SignAndSend);
            }
            if capabilities.can_sign_only {
                paths.push(SubmissionPath::SignThenSend);
            }
        },
        DeviceClass::Mobile => {
            if capabilities.can_sign_only {
                paths.push(SubmissionPath::SignThenSend);
            }
            if capabilities.can_sign_and_send {
                paths.push(SubmissionPath::SignAndSend);
            }
        },
    }
    paths
}

/// Preflight simulation is skipped on mobile: lagging RPC nodes reject valid
/// transactions there.
pub fn send_options(device: DeviceClass) -> SendOptions {
    SendOptions {
        skip_preflight: device.is_mobile(),
        preflight_commitment: CommitmentLevel::Confirmed,
    }
}

/// Failures that retrying cannot fix.
fn is_final(error: &PaymentError) -> bool {
    matches!(
        error,
        PaymentError::UserRejected
            | PaymentError::WalletNotConnected
            | PaymentError::InsufficientBalance { .. }
            | PaymentError::InvalidAddress(_)
            | PaymentError::InvalidAmount(_)
    )
}

pub struct SubmissionStrategy<'a> {
    connection: &'a dyn SolConnection,
    wallet: &'a dyn WalletSigner,
    config: &'a PaymentConfig,
    device: DeviceClass,
}

impl<'a> SubmissionStrategy<'a> {
    pub fn new(
        connection: &'a dyn SolConnection,
        wallet: &'a dyn WalletSigner,
        config: &'a PaymentConfig,
        device: DeviceClass,
    ) -> Self {
        Self {
            connection,
            wallet,
            config,
            device,
        }
    }

    /// Signing requests allowed for one payment.
    fn max_attempts(&self, paths: usize) -> u32 {
        match self.device {
            DeviceClass::Desktop => paths as u32,
            DeviceClass::Mobile => self.config.mobile_sign_attempts.max(1),
        }
    }

    /// Construct, sign and broadcast a transfer for `request`.
    ///
    /// Once a sign request reaches the wallet it runs to completion; there is no
    /// cancellation of an in-flight signature.
    pub async fn submit(
        &self,
        request: &PaymentRequest,
    ) -> Result<Submission, SubmissionFailure> {
        let fail = |error: PaymentError, attempts: u32| SubmissionFailure { error, attempts };

        let Some(payer) = self.wallet.pubkey() else {
            return Err(fail(PaymentError::WalletNotConnected, 0));
        };
        let capabilities = self.wallet.capabilities();
        let paths = path_order(capabilities, self.device);
        if paths.is_empty() {
            return Err(fail(
                PaymentError::TransactionFailed("wallet cannot sign transactions".to_string()),
                0,
            ));
        }

        let max_attempts = self.max_attempts(paths.len());
        let mut last_error = PaymentError::TransactionFailed("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            let path = paths[(attempt as usize - 1) % paths.len()];
            info!(
                request_id = request.id(),
                attempt,
                max_attempts,
                %path,
                device = %self.device,
                "submitting payment"
            );

            match self.attempt(&payer, request, path).await {
                Ok((signature, token)) => {
                    info!(request_id = request.id(), %signature, %path, attempt, "payment submitted");
                    return Ok(Submission {
                        signature,
                        token,
                        path,
                        attempts: attempt,
                    });
                },
                Err(err) if is_final(&err) => {
                    error!(request_id = request.id(), attempt, error = %err, "payment aborted");
                    return Err(fail(err, attempt));
                },
                Err(err) => {
                    warn!(request_id = request.id(), attempt, %path, error = %err, "submission attempt failed");
                    last_error = err;
                },
            }

            if self.device.is_mobile() && attempt < max_attempts {
                tokio::time::sleep(self.config.mobile_retry_delay).await;
            }
        }

        error!(request_id = request.id(), error = %last_error, "submission attempts exhausted");
        Err(fail(last_error, max_attempts))
    }

    /// One attempt: a fresh transaction sent to the wallet through `path`.
    async fn attempt(
        &self,
        payer: &Pubkey,
        request: &PaymentRequest,
        path: SubmissionPath,
    ) -> Result<(Signature, FreshnessToken), PaymentError> {
        debug!(stage = ?PaymentStage::Constructing, "building transfer");
        let (tx, token) = build_transfer(self.connection, payer, request, self.device).await?;
        enforce_transaction_check(&tx, payer, self.device)?;

        let signature = match path {
            SubmissionPath::SignAndSend => self.sign_and_send(tx).await?,
            SubmissionPath::SignThenSend => self.sign_then_send(payer, tx).await?,
        };
        Ok((signature, token))
    }

    async fn sign_and_send(&self, tx: Transaction) -> Result<Signature, PaymentError> {
        debug!(stage = ?PaymentStage::Signing, path = %SubmissionPath::SignAndSend, "requesting signature");
        self.wallet
            .sign_and_send_transaction(tx, self.connection, send_options(self.device))
            .await
            .map_err(|e| self.wallet_error(e))
    }

    async fn sign_then_send(&self, payer: &Pubkey, tx: Transaction) -> Result<Signature, PaymentError> {
        debug!(stage = ?PaymentStage::Signing, path = %SubmissionPath::SignThenSend, "requesting signature");
        let signed = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| self.wallet_error(e))?;
        enforce_transaction_check(&signed, payer, self.device)?;

        debug!(stage = ?PaymentStage::Submitting, "broadcasting signed transaction");
        self.connection
            .send_raw_transaction(&signed, send_options(self.device))
            .await
            .map_err(|e| classify_client_error(&e, self.device))
    }

    fn wallet_error(&self, err: WalletError) -> PaymentError {
        debug!(error = %err, "wallet error");
        classify_wallet_error(&err, self.device)
    }
}
