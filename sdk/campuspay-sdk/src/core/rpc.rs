use crate::core::connection::{
    BlockhashExpired, ClientError, FreshnessToken, SendOptions, SignatureInfo, SolConnection,
    TransactionDetail,
};
use crate::core::constants::MEMO_PROGRAM_ID;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use solana_transaction_status_client_types::UiTransactionEncoding;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`SolConnection`] backed by a JSON-RPC endpoint.
pub struct RpcConnection {
    client: RpcClient,
}

impl RpcConnection {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }

    pub fn from_client(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

#[async_trait]
impl SolConnection for RpcConnection {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> Result<FreshnessToken, ClientError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(CommitmentConfig { commitment })
            .await?;
        Ok(FreshnessToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_raw_transaction(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, ClientError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(options.preflight_commitment),
            ..RpcSendTransactionConfig::default()
        };
        Ok(self.client.send_transaction_with_config(tx, config).await?)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        token: &FreshnessToken,
        commitment: CommitmentLevel,
    ) -> Result<Result<(), TransactionError>, ClientError> {
        let commitment = CommitmentConfig { commitment };
        loop {
            if let Some(status) = self
                .client
                .get_signature_status_with_commitment(signature, commitment)
                .await?
            {
                return Ok(status);
            }

            let height = self
                .client
                .get_block_height_with_commitment(commitment)
                .await?;
            if height > token.last_valid_block_height {
                return Err(Box::new(BlockhashExpired {
                    signature: *signature,
                }));
            }

            debug!(%signature, height, "signature not yet visible");
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ClientError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            commitment: Some(CommitmentConfig::confirmed()),
            ..GetConfirmedSignaturesForAddress2Config::default()
        };
        let entries = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?;

        entries
            .into_iter()
            .map(|entry| -> Result<SignatureInfo, ClientError> {
                Ok(SignatureInfo {
                    signature: Signature::from_str(&entry.signature)?,
                    slot: entry.slot,
                    err: entry.err,
                    block_time: entry.block_time,
                })
            })
            .collect()
    }

    async fn get_transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionDetail>, ClientError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .client
            .get_transaction_with_config(signature, config)
            .await?;

        let Some(meta) = confirmed.transaction.meta else {
            return Ok(None);
        };
        let Some(tx) = confirmed.transaction.transaction.decode() else {
            return Ok(None);
        };

        // Lookup-table addresses are not resolved; payments built here never use them.
        let account_keys = tx.message.static_account_keys().to_vec();
        let memo = tx.message.instructions().iter().find_map(|ix| {
            let program = account_keys.get(ix.program_id_index as usize)?;
            (*program == MEMO_PROGRAM_ID).then(|| String::from_utf8_lossy(&ix.data).into_owned())
        });

        Ok(Some(TransactionDetail {
            account_keys,
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
            memo,
            err: meta.err,
        }))
    }
}
