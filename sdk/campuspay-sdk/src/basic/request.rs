use crate::basic::link::PaymentLink;
use crate::config::PaymentConfig;
use crate::error::{PaymentError, Result};
use crate::utils::{parse_address, sol_to_lamports};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::time::Duration;
use tracing::warn;

/// Which amount ceiling applies to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// Vendor checkout or scan-to-pay code.
    #[default]
    Vendor,
    /// Direct wallet-to-wallet transfer.
    Transfer,
}

/// Immutable description of a payment to make. Created by [`PaymentRequestBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    id: String,
    recipient: Pubkey,
    amount: Decimal,
    lamports: u64,
    label: Option<String>,
    message: Option<String>,
    memo: Option<String>,
    reference: Option<Pubkey>,
    kind: PaymentKind,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn builder(recipient: impl Into<String>, amount: Decimal) -> PaymentRequestBuilder {
        PaymentRequestBuilder::new(recipient, amount)
    }

    /// Correlation key into the reconciliation sink.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn recipient(&self) -> &Pubkey {
        &self.recipient
    }

    /// Amount in SOL.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Amount in lamports, truncated.
    pub fn lamports(&self) -> u64 {
        self.lamports
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn reference(&self) -> Option<&Pubkey> {
        self.reference.as_ref()
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Human-readable purpose for the transaction record.
    pub fn purpose(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Payment".to_string())
    }

    pub fn to_link(&self) -> PaymentLink {
        PaymentLink {
            recipient: self.recipient,
            amount: Some(self.amount),
            reference: self.reference,
            label: self.label.clone(),
            message: self.message.clone(),
            memo: self.memo.clone(),
        }
    }

    /// Encoded payment link, the only state shared with a scanning session.
    pub fn to_uri(&self) -> String {
        self.to_link().encode()
    }
}

pub struct PaymentRequestBuilder {
    recipient: String,
    amount: Decimal,
    label: Option<String>,
    message: Option<String>,
    memo: Option<String>,
    reference: Option<Pubkey>,
    kind: PaymentKind,
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl PaymentRequestBuilder {
    pub fn new(recipient: impl Into<String>, amount: Decimal) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
            label: None,
            message: None,
            memo: None,
            reference: None,
            kind: PaymentKind::Vendor,
            id: None,
            created_at: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_reference(mut self, reference: Pubkey) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Attach a throwaway reference address so a watcher can find the payment.
    pub fn with_new_reference(self) -> Self {
        self.with_reference(Keypair::new().pubkey())
    }

    pub fn with_kind(mut self, kind: PaymentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self, config: &PaymentConfig) -> Result<PaymentRequest> {
        let recipient = parse_address(&self.recipient)?;

        let ceiling = match self.kind {
            PaymentKind::Vendor => config.max_vendor_amount,
            PaymentKind::Transfer => config.max_transfer_amount,
        };
        if self.amount < config.min_amount {
            return Err(PaymentError::InvalidAmount(format!(
                "{} SOL is below the minimum of {} SOL",
                self.amount, config.min_amount
            )));
        }
        if self.amount > ceiling {
            return Err(PaymentError::InvalidAmount(format!(
                "{} SOL exceeds the maximum of {} SOL",
                self.amount, ceiling
            )));
        }
        let lamports = sol_to_lamports(self.amount)?;

        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let ttl = chrono::Duration::from_std(config.request_ttl)
            .map_err(|e| PaymentError::InvalidAmount(format!("request ttl: {e}")))?;

        Ok(PaymentRequest {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            recipient,
            amount: self.amount.normalize(),
            lamports,
            label: bounded(self.label, config.max_text_len),
            message: bounded(self.message, config.max_text_len),
            memo: bounded(self.memo, config.max_text_len),
            reference: self.reference,
            kind: self.kind,
            created_at,
            expires_at: created_at + ttl,
        })
    }
}

fn bounded(text: Option<String>, max_len: usize) -> Option<String> {
    let text = text?.trim().to_string();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= max_len {
        return Some(text);
    }
    warn!(max_len, "truncating payment text");
    Some(text.chars().take(max_len).collect())
}
