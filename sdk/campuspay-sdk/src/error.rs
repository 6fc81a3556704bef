use crate::core::connection::{BlockhashExpired, ClientError};
use crate::core::device::DeviceClass;
use crate::core::signer::WalletError;
use crate::utils::lamports_to_sol;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// User-facing payment failure categories. Every terminal failure the engine reports
/// is one of these, never a raw client or wallet error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// No active signing session
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Holdings do not cover amount plus fee (lamports)
    #[error("Insufficient balance: need {required} lamports, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Transaction rejected by user")]
    UserRejected,

    /// The submitted transaction lacked a valid payer signature
    #[error("Signature verification failed ({device})")]
    SignatureVerificationFailed { device: DeviceClass },

    #[error("Network error: {0}")]
    NetworkError(String),

    /// The blockhash validity window passed before confirmation
    #[error("Transaction expired before confirmation")]
    TransactionExpired,

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Processed on-chain but failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl PaymentError {
    /// Lamports missing for an [`PaymentError::InsufficientBalance`] failure.
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            PaymentError::InsufficientBalance {
                required,
                available,
            } => Some(required.saturating_sub(*available)),
            _ => None,
        }
    }

    /// Message the presentation layer can show as-is.
    pub fn remediation(&self) -> String {
        match self {
            PaymentError::WalletNotConnected => {
                "Connect your wallet and try again.".to_string()
            },
            PaymentError::InvalidAddress(detail) => {
                format!("The recipient address is not valid ({detail}). Check the address and try again.")
            },
            PaymentError::InvalidAmount(detail) => {
                format!("The amount is not valid ({detail}).")
            },
            PaymentError::InsufficientBalance { available, .. } => format!(
                "Insufficient balance: you have {} SOL and need {} SOL more (including network fee).",
                lamports_to_sol(*available),
                lamports_to_sol(self.shortfall().unwrap_or_default()),
            ),
            PaymentError::UserRejected => {
                "You cancelled the transaction in your wallet. No funds were sent.".to_string()
            },
            PaymentError::SignatureVerificationFailed {
                device: DeviceClass::Mobile,
            } => "Your mobile wallet did not sign the transaction correctly. Open the site \
                  inside your wallet app's browser, reconnect, and try again."
                .to_string(),
            PaymentError::SignatureVerificationFailed {
                device: DeviceClass::Desktop,
            } => "The wallet signature could not be verified. Unlock your wallet extension, \
                  reconnect it, and try again."
                .to_string(),
            PaymentError::NetworkError(_) => {
                "Could not reach the Solana network. Check your connection and try again."
                    .to_string()
            },
            PaymentError::TransactionExpired => {
                "The transaction expired before it was confirmed. Please try again.".to_string()
            },
            PaymentError::Timeout(_) => "Confirmation is taking longer than expected. Check \
                                         your wallet history before paying again."
                .to_string(),
            PaymentError::TransactionFailed(detail) => {
                format!("The transaction failed on-chain: {detail}")
            },
        }
    }
}

/// Result type alias for payment operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Map a signing agent failure into the taxonomy.
pub fn classify_wallet_error(err: &WalletError, device: DeviceClass) -> PaymentError {
    match err {
        WalletError::NotConnected => PaymentError::WalletNotConnected,
        WalletError::Rejected => PaymentError::UserRejected,
        WalletError::Unsupported(op) => {
            PaymentError::TransactionFailed(format!("wallet does not support {op}"))
        },
        WalletError::Other(message) => classify_message(message, device)
            .unwrap_or_else(|| PaymentError::TransactionFailed(message.clone())),
    }
}

/// Map a network client failure into the taxonomy. Unknown failures are network errors.
pub fn classify_client_error(err: &ClientError, device: DeviceClass) -> PaymentError {
    if err.downcast_ref::<BlockhashExpired>().is_some() {
        return PaymentError::TransactionExpired;
    }
    let message = err.to_string();
    classify_message(&message, device).unwrap_or(PaymentError::NetworkError(message))
}

/// Map an on-chain execution error into the taxonomy.
pub fn classify_transaction_error(err: &TransactionError, device: DeviceClass) -> PaymentError {
    match err {
        TransactionError::SignatureFailure => PaymentError::SignatureVerificationFailed { device },
        TransactionError::BlockhashNotFound => PaymentError::TransactionExpired,
        other => PaymentError::TransactionFailed(other.to_string()),
    }
}

fn classify_message(message: &str, device: DeviceClass) -> Option<PaymentError> {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));

    if has(&["user rejected", "rejected the request", "user denied", "declined", "cancelled", "canceled"]) {
        Some(PaymentError::UserRejected)
    } else if has(&["not connected", "no wallet"]) {
        Some(PaymentError::WalletNotConnected)
    } else if has(&["signature verification", "missing signature", "signature failure", "invalid signature"]) {
        Some(PaymentError::SignatureVerificationFailed { device })
    } else if has(&["blockhash not found", "block height exceeded", "has expired"]) {
        Some(PaymentError::TransactionExpired)
    } else if has(&["timed out", "timeout"]) {
        Some(PaymentError::Timeout(message.to_string()))
    } else if has(&["network", "failed to fetch", "connection", "econnrefused", "dns", "429", "503"]) {
        Some(PaymentError::NetworkError(message.to_string()))
    } else {
        None
    }
}
