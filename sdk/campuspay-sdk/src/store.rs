//! Transaction-record persistence. The engine treats storage as a side-effect sink:
//! it opens a `pending` record once and settles it at most once.

use crate::basic::request::PaymentRequest;
use crate::status::{StatusListener, StatusUpdate};
use crate::types::{PaymentStatus, RecordStatus, TransactionRecord};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keyed record repository.
pub trait RecordStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<TransactionRecord>, StoreError>;
    fn put(&self, record: TransactionRecord) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<TransactionRecord>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process store, one per process or per test.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, TransactionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(lock(&self.records).get(id).cloned())
    }

    fn put(&self, record: TransactionRecord) -> Result<(), StoreError> {
        lock(&self.records).insert(record.id.clone(), record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(lock(&self.records).values().cloned().collect())
    }
}

/// Store backed by a single JSON document (an id-keyed object).
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, TransactionRecord>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, records: &BTreeMap<String, TransactionRecord>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let _guard = lock(&self.guard);
        Ok(self.read_all()?.remove(id))
    }

    fn put(&self, record: TransactionRecord) -> Result<(), StoreError> {
        let _guard = lock(&self.guard);
        let mut records = self.read_all()?;
        records.insert(record.id.clone(), record);
        self.write_all(&records)
    }

    fn list(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        let _guard = lock(&self.guard);
        Ok(self.read_all()?.into_values().collect())
    }
}

/// Writes status transitions into a [`RecordStore`]: create once, then at most one
/// terminal update per id.
#[derive(Clone)]
pub struct ReconciliationSink {
    store: Arc<dyn RecordStore>,
}

impl ReconciliationSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Create the `pending` record for `request`. An existing record is returned untouched.
    pub fn open(
        &self,
        request: &PaymentRequest,
        payer: Option<&Pubkey>,
    ) -> Result<TransactionRecord, StoreError> {
        if let Some(existing) = self.store.get(request.id())? {
            return Ok(existing);
        }

        let record = TransactionRecord {
            id: request.id().to_string(),
            from_address: payer.map(ToString::to_string).unwrap_or_default(),
            to_address: request.recipient().to_string(),
            amount: request.amount(),
            status: RecordStatus::Pending,
            signature: None,
            timestamp: Utc::now(),
            purpose: request.purpose(),
        };
        self.store.put(record.clone())?;
        info!(request_id = request.id(), "transaction record opened");
        Ok(record)
    }

    /// Apply the terminal transition carried by `update`.
    ///
    /// Returns `false` when the update is not terminal, the record is missing, or the
    /// record already reached a terminal state.
    pub fn settle(&self, update: &StatusUpdate) -> Result<bool, StoreError> {
        let status = match update.status {
            PaymentStatus::Confirmed => RecordStatus::Confirmed,
            PaymentStatus::Failed | PaymentStatus::Expired => RecordStatus::Failed,
            PaymentStatus::Initiating | PaymentStatus::Processing => return Ok(false),
        };

        let Some(mut record) = self.store.get(&update.request_id)? else {
            warn!(request_id = %update.request_id, "no record to settle");
            return Ok(false);
        };
        if record.status.is_terminal() {
            warn!(
                request_id = %update.request_id,
                current = ?record.status,
                "record already settled, ignoring update"
            );
            return Ok(false);
        }

        record.status = status;
        if let Some(signature) = update.signature {
            record.signature = Some(signature.to_string());
        }
        if record.from_address.is_empty() {
            if let Some(payer) = update.payer {
                record.from_address = payer.to_string();
            }
        }
        record.timestamp = Utc::now();
        self.store.put(record)?;
        info!(request_id = %update.request_id, ?status, "transaction record settled");
        Ok(true)
    }
}

impl StatusListener for ReconciliationSink {
    fn on_status(&self, update: &StatusUpdate) {
        if let Err(err) = self.settle(update) {
            warn!(request_id = %update.request_id, error = %err, "failed to persist status");
        }
    }
}
