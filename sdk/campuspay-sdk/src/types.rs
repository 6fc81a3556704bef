use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use std::fmt;

/// Lifecycle of a single payment request as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initiating,
    Processing,
    Confirmed,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Confirmed | PaymentStatus::Failed | PaymentStatus::Expired
        )
    }

    /// Position along `initiating -> processing -> terminal`.
    pub(crate) fn rank(self) -> u8 {
        match self {
            PaymentStatus::Initiating => 0,
            PaymentStatus::Processing => 1,
            PaymentStatus::Confirmed | PaymentStatus::Failed | PaymentStatus::Expired => 2,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Initiating => "initiating",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Terminal artifact of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    /// Empty (`None`) until submission succeeds.
    pub signature: Option<Signature>,
    pub status: PaymentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Present iff `status == Failed`.
    pub error: Option<PaymentError>,
}

impl PaymentResult {
    pub fn confirmed(signature: Signature) -> Self {
        Self {
            signature: Some(signature),
            status: PaymentStatus::Confirmed,
            confirmed_at: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failed(signature: Option<Signature>, error: PaymentError) -> Self {
        Self {
            signature,
            status: PaymentStatus::Failed,
            confirmed_at: None,
            error: Some(error),
        }
    }

    pub fn expired(signature: Option<Signature>) -> Self {
        Self {
            signature,
            status: PaymentStatus::Expired,
            confirmed_at: None,
            error: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

/// Outcome of the balance gate. Never an error: an unreadable balance is reported as
/// insufficient with a zero balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub current_balance: u64,
    /// Amount plus estimated fee, in lamports.
    pub required: u64,
}

impl BalanceCheck {
    pub fn shortfall(&self) -> u64 {
        self.required.saturating_sub(self.current_balance)
    }
}

/// Persisted status of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(self) -> bool {
        self != RecordStatus::Pending
    }
}

/// Lifecycle record kept by the reconciliation sink, keyed by payment request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub purpose: String,
}

/// Which submission path produced the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionPath {
    /// The agent signed and broadcast in one call.
    SignAndSend,
    /// The agent signed; the engine broadcast.
    SignThenSend,
}

impl fmt::Display for SubmissionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionPath::SignAndSend => f.write_str("sign-and-send"),
            SubmissionPath::SignThenSend => f.write_str("sign-then-send"),
        }
    }
}
