use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use std::error::Error;

/// Raw failure reported by the network client.
pub type ClientError = Box<dyn Error + Send + Sync>;

/// Recent blockhash plus the last block height at which it is still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Options forwarded to `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: CommitmentLevel,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: CommitmentLevel::Confirmed,
        }
    }
}

/// One entry of `getSignaturesForAddress`, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub slot: u64,
    pub err: Option<TransactionError>,
    pub block_time: Option<i64>,
}

/// The parts of a confirmed transaction the payment-match watcher inspects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDetail {
    /// Account keys in message order; balances are indexed the same way.
    pub account_keys: Vec<Pubkey>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub memo: Option<String>,
    pub err: Option<TransactionError>,
}

impl TransactionDetail {
    /// Lamport delta credited to `account`, or `None` if the account is absent.
    pub fn balance_delta(&self, account: &Pubkey) -> Option<i128> {
        let index = self.account_keys.iter().position(|key| key == account)?;
        let pre = *self.pre_balances.get(index)?;
        let post = *self.post_balances.get(index)?;
        Some(post as i128 - pre as i128)
    }
}

/// Raised by `confirm_transaction` once the blockhash validity window has passed
/// without the signature reaching the requested commitment.
#[derive(Debug, thiserror::Error)]
#[error("block height exceeded: signature {signature} has expired")]
pub struct BlockhashExpired {
    pub signature: Signature,
}

/// Network client contract. Implemented by [`crate::core::rpc::RpcConnection`] for
/// live clusters and by test doubles.
#[async_trait]
pub trait SolConnection: Send + Sync {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError>;

    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> Result<FreshnessToken, ClientError>;

    async fn send_raw_transaction(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, ClientError>;

    /// Wait until `signature` reaches `commitment`.
    ///
    /// The outer `Err` means no result could be observed (transport failure, timeout,
    /// [`BlockhashExpired`]). The inner `Err` is the on-chain execution error.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        token: &FreshnessToken,
        commitment: CommitmentLevel,
    ) -> Result<Result<(), TransactionError>, ClientError>;

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ClientError>;

    async fn get_transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionDetail>, ClientError>;
}
