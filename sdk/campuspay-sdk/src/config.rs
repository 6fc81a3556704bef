use crate::core::constants::{DEFAULT_ESTIMATED_FEE_LAMPORTS, DEFAULT_REQUEST_TTL, DEVNET_RPC_URL};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Tunables of the payment engine. Deserializes from partial JSON; omitted fields keep
/// their defaults. Durations are given in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub min_amount: Decimal,
    /// Ceiling for vendor and scan-to-pay requests.
    #[serde(with = "rust_decimal::serde::str")]
    pub max_vendor_amount: Decimal,
    /// Ceiling for raw wallet-to-wallet transfers.
    #[serde(with = "rust_decimal::serde::str")]
    pub max_transfer_amount: Decimal,
    pub estimated_fee_lamports: u64,
    pub max_text_len: usize,
    #[serde(rename = "requestTtlMs", with = "millis")]
    pub request_ttl: Duration,
    #[serde(rename = "watchIntervalMs", with = "millis")]
    pub watch_interval: Duration,
    pub watch_signature_limit: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub match_tolerance: Decimal,
    pub mobile_sign_attempts: u32,
    #[serde(rename = "mobileRetryDelayMs", with = "millis")]
    pub mobile_retry_delay: Duration,
    /// Waits before the second and the final (finalized) mobile confirmation attempts.
    #[serde(rename = "confirmBackoffMs", with = "millis_pair")]
    pub confirm_backoff: (Duration, Duration),
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::new(1, 3),
            max_vendor_amount: Decimal::from(10),
            max_transfer_amount: Decimal::from(1000),
            estimated_fee_lamports: DEFAULT_ESTIMATED_FEE_LAMPORTS,
            max_text_len: 200,
            request_ttl: DEFAULT_REQUEST_TTL,
            watch_interval: Duration::from_millis(2_500),
            watch_signature_limit: 10,
            match_tolerance: Decimal::new(1, 2),
            mobile_sign_attempts: 3,
            mobile_retry_delay: Duration::from_secs(1),
            confirm_backoff: (Duration::from_secs(5), Duration::from_secs(3)),
        }
    }
}

impl PaymentConfig {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(
                "minimum amount must be positive".to_string(),
            ));
        }
        if self.max_vendor_amount < self.min_amount || self.max_transfer_amount < self.min_amount
        {
            return Err(PaymentError::InvalidAmount(
                "maximum amount is below the minimum".to_string(),
            ));
        }
        if self.match_tolerance < Decimal::ZERO || self.mobile_sign_attempts == 0 {
            return Err(PaymentError::InvalidAmount(
                "tolerance and attempt count must be non-negative and non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cluster endpoint and payer key location, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub rpc_url: String,
    pub keypair_path: String,
}

impl ClusterConfig {
    pub fn from_env() -> Self {
        let rpc_url = env::var("RPC_URL").unwrap_or_else(|_| DEVNET_RPC_URL.to_string());
        let keypair_path = env::var("KEYPAIR")
            .unwrap_or_else(|_| shellexpand::tilde("~/.config/solana/id.json").into_owned());
        Self {
            rpc_url,
            keypair_path,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod millis_pair {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<(Duration, Duration), D::Error> {
        let (first, second) = <(u64, u64)>::deserialize(deserializer)?;
        Ok((Duration::from_millis(first), Duration::from_millis(second)))
    }
}
