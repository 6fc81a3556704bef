use crate::error::PaymentError;
use crate::types::PaymentStatus;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tracing::{info, warn};

/// A status transition delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub request_id: String,
    pub status: PaymentStatus,
    pub signature: Option<Signature>,
    /// Paying account, when known (the watcher learns it from the matched transaction).
    pub payer: Option<Pubkey>,
    pub error: Option<PaymentError>,
}

/// Receives status transitions for payment requests.
pub trait StatusListener: Send + Sync {
    fn on_status(&self, update: &StatusUpdate);
}

impl<F> StatusListener for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn on_status(&self, update: &StatusUpdate) {
        self(update)
    }
}

/// Per-request gate that only forwards monotonic transitions along
/// `initiating -> processing -> {confirmed | failed | expired}`.
pub struct StatusTracker {
    request_id: String,
    current: Option<PaymentStatus>,
    listeners: Vec<Arc<dyn StatusListener>>,
}

impl StatusTracker {
    pub fn new(request_id: impl Into<String>, listeners: Vec<Arc<dyn StatusListener>>) -> Self {
        Self {
            request_id: request_id.into(),
            current: None,
            listeners,
        }
    }

    pub fn current(&self) -> Option<PaymentStatus> {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_some_and(PaymentStatus::is_terminal)
    }

    /// Forward `update` unless it would repeat, regress, or follow a terminal state.
    /// Returns whether listeners were notified.
    pub fn advance(&mut self, update: StatusUpdate) -> bool {
        if let Some(current) = self.current {
            if current.is_terminal() || update.status.rank() <= current.rank() {
                warn!(
                    request_id = %self.request_id,
                    from = %current,
                    to = %update.status,
                    "dropping out-of-order status transition"
                );
                return false;
            }
        }

        info!(
            request_id = %self.request_id,
            status = %update.status,
            signature = ?update.signature,
            "payment status"
        );
        self.current = Some(update.status);
        for listener in &self.listeners {
            listener.on_status(&update);
        }
        true
    }

    pub fn update(&self, status: PaymentStatus) -> StatusUpdate {
        StatusUpdate {
            request_id: self.request_id.clone(),
            status,
            signature: None,
            payer: None,
            error: None,
        }
    }
}
