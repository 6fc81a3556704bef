use crate::core::connection::{SendOptions, SolConnection};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use thiserror::Error;

/// Failure reported by a signing agent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,

    /// The agent does not expose the requested operation.
    #[error("wallet does not support {0}")]
    Unsupported(&'static str),

    /// The user dismissed or declined the request.
    #[error("user rejected the request")]
    Rejected,

    #[error("{0}")]
    Other(String),
}

/// What a connected signing agent can do. Read before choosing a submission path, never assumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletCapabilities {
    pub can_sign_and_send: bool,
    pub can_sign_only: bool,
}

impl WalletCapabilities {
    pub fn any(&self) -> bool {
        self.can_sign_and_send || self.can_sign_only
    }
}

/// Signing agent holding the payer's key.
///
/// Agents differ in what they expose: some only sign, some sign and broadcast in one
/// call. Both methods default to [`WalletError::Unsupported`]; an implementor overrides
/// the ones it supports and reports them from [`WalletSigner::capabilities`], which the
/// engine reads before choosing a submission path.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Public key of the connected account, `None` when disconnected.
    fn pubkey(&self) -> Option<Pubkey>;

    fn connected(&self) -> bool {
        self.pubkey().is_some()
    }

    fn capabilities(&self) -> WalletCapabilities;

    async fn sign_transaction(&self, _tx: Transaction) -> Result<Transaction, WalletError> {
        Err(WalletError::Unsupported("signTransaction"))
    }

    async fn sign_and_send_transaction(
        &self,
        _tx: Transaction,
        _connection: &dyn SolConnection,
        _options: SendOptions,
    ) -> Result<Signature, WalletError> {
        Err(WalletError::Unsupported("signAndSendTransaction"))
    }
}

/// A signing agent backed by a local keypair. Supports both paths.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    fn capabilities(&self) -> WalletCapabilities {
        WalletCapabilities {
            can_sign_and_send: true,
            can_sign_only: true,
        }
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Other(e.to_string()))?;
        Ok(tx)
    }

    async fn sign_and_send_transaction(
        &self,
        tx: Transaction,
        connection: &dyn SolConnection,
        options: SendOptions,
    ) -> Result<Signature, WalletError> {
        let signed = self.sign_transaction(tx).await?;
        connection
            .send_raw_transaction(&signed, options)
            .await
            .map_err(|e| WalletError::Other(e.to_string()))
    }
}
