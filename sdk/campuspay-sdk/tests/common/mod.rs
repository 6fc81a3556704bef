use async_trait::async_trait;
use campuspay_sdk::core::connection::{
    ClientError, FreshnessToken, SendOptions, SignatureInfo, SolConnection, TransactionDetail,
};
use campuspay_sdk::core::signer::{WalletCapabilities, WalletError, WalletSigner};
use campuspay_sdk::status::{StatusListener, StatusUpdate};
use campuspay_sdk::types::PaymentStatus;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_program;
use solana_sdk::transaction::{Transaction, TransactionError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SOL: u64 = 1_000_000_000;

/// In-memory ledger implementing `SolConnection`, with call counters and scripted
/// confirmation outcomes.
#[derive(Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<Pubkey, u64>>,
    history: Mutex<HashMap<Pubkey, Vec<SignatureInfo>>>,
    details: Mutex<HashMap<Signature, TransactionDetail>>,
    confirmations: Mutex<VecDeque<Result<Result<(), TransactionError>, String>>>,
    pub sent: Mutex<Vec<Transaction>>,
    slot: AtomicU64,
    fail_balance: AtomicBool,
    stall_polls: AtomicBool,
    pub balance_calls: AtomicUsize,
    pub blockhash_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(address, lamports);
    }

    /// Make every balance read fail as if the RPC node were unreachable.
    pub fn fail_balance_reads(&self) {
        self.fail_balance.store(true, Ordering::SeqCst);
    }

    /// Make signature polls hang without ever answering.
    pub fn stall_polls(&self) {
        self.stall_polls.store(true, Ordering::SeqCst);
    }

    /// Queue the result of the next `confirm_transaction` call. Unscripted calls succeed.
    pub fn script_confirmation(&self, outcome: Result<Result<(), TransactionError>, String>) {
        self.confirmations.lock().unwrap().push_back(outcome);
    }

    /// Land a transfer of `lamports` from `payer` to `recipient` tagged with `reference`.
    pub fn land_transfer(
        &self,
        payer: &Pubkey,
        recipient: &Pubkey,
        reference: &Pubkey,
        lamports: u64,
    ) -> Signature {
        let slot = self.slot.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [9u8; 64];
        bytes[..8].copy_from_slice(&slot.to_le_bytes());
        let signature = Signature::from(bytes);
        let detail = TransactionDetail {
            account_keys: vec![*payer, *recipient, system_program::id(), *reference],
            pre_balances: vec![10 * SOL, SOL, 1, 0],
            post_balances: vec![10 * SOL - lamports - 5_000, SOL + lamports, 1, 0],
            memo: None,
            err: None,
        };
        self.details.lock().unwrap().insert(signature, detail);
        self.history
            .lock()
            .unwrap()
            .entry(*reference)
            .or_default()
            .insert(
                0,
                SignatureInfo {
                    signature,
                    slot,
                    err: None,
                    block_time: None,
                },
            );
        signature
    }

    /// Every network call made so far.
    pub fn total_calls(&self) -> usize {
        [
            &self.balance_calls,
            &self.blockhash_calls,
            &self.send_calls,
            &self.confirm_calls,
            &self.poll_calls,
            &self.detail_calls,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

#[async_trait]
impl SolConnection for MockLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: CommitmentLevel,
    ) -> Result<FreshnessToken, ClientError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FreshnessToken {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 150 + self.slot.load(Ordering::SeqCst),
        })
    }

    async fn send_raw_transaction(
        &self,
        tx: &Transaction,
        _options: SendOptions,
    ) -> Result<Signature, ClientError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let signature = *tx.signatures.first().ok_or("transaction has no signatures")?;
        if signature == Signature::default() {
            return Err("Transaction signature verification failure".into());
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _token: &FreshnessToken,
        _commitment: CommitmentLevel,
    ) -> Result<Result<(), TransactionError>, ClientError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        match self.confirmations.lock().unwrap().pop_front() {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(message.into()),
            None => Ok(Ok(())),
        }
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ClientError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_polls.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let history = self.history.lock().unwrap();
        Ok(history
            .get(address)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionDetail>, ClientError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.details.lock().unwrap().get(signature).cloned())
    }
}

/// Signing agent with configurable capabilities and scripted failures.
pub struct MockWallet {
    keypair: Keypair,
    capabilities: WalletCapabilities,
    connected: bool,
    failures: Mutex<VecDeque<WalletError>>,
    pub sign_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::new(),
            capabilities: WalletCapabilities {
                can_sign_and_send: true,
                can_sign_only: true,
            },
            connected: true,
            failures: Mutex::new(VecDeque::new()),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// A wallet that can only sign, as most in-app mobile browsers expose.
    pub fn sign_only() -> Self {
        Self {
            capabilities: WalletCapabilities {
                can_sign_and_send: false,
                can_sign_only: true,
            },
            ..Self::new()
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Fail the next signing request (either path) with `error`.
    pub fn fail_next(self, error: WalletError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn begin(&self) -> Result<(), WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connected {
            return Err(WalletError::NotConnected);
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn sign(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Other(e.to_string()))?;
        Ok(tx)
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        self.connected.then(|| self.keypair.pubkey())
    }

    fn capabilities(&self) -> WalletCapabilities {
        self.capabilities
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        if !self.capabilities.can_sign_only {
            return Err(WalletError::Unsupported("signTransaction"));
        }
        self.begin()?;
        self.sign(tx)
    }

    async fn sign_and_send_transaction(
        &self,
        tx: Transaction,
        connection: &dyn SolConnection,
        options: SendOptions,
    ) -> Result<Signature, WalletError> {
        if !self.capabilities.can_sign_and_send {
            return Err(WalletError::Unsupported("signAndSendTransaction"));
        }
        self.begin()?;
        let signed = self.sign(tx)?;
        connection
            .send_raw_transaction(&signed, options)
            .await
            .map_err(|e| WalletError::Other(e.to_string()))
    }
}

/// Listener that records every status it receives.
pub fn status_recorder() -> (Arc<Mutex<Vec<StatusUpdate>>>, Arc<dyn StatusListener>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: Arc<dyn StatusListener> = Arc::new(move |update: &StatusUpdate| {
        sink.lock().unwrap().push(update.clone());
    });
    (seen, listener)
}

pub fn statuses(seen: &Mutex<Vec<StatusUpdate>>) -> Vec<PaymentStatus> {
    seen.lock().unwrap().iter().map(|update| update.status).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
