pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod status;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::advanced::{PaymentMatchWatcher, WatchHandle, WatchOutcome};
pub use crate::basic::{PaymentKind, PaymentLink, PaymentOutcome, PaymentRequest, PaymentSession};
pub use crate::config::{ClusterConfig, PaymentConfig};
pub use crate::core::connection::SolConnection;
pub use crate::core::device::{ClientHints, DeviceClass};
pub use crate::core::rpc::RpcConnection;
pub use crate::core::signer::{KeypairWallet, WalletSigner};
pub use crate::error::{PaymentError, Result};
pub use crate::status::{StatusListener, StatusUpdate};
pub use crate::store::{JsonFileStore, MemoryStore, RecordStore, ReconciliationSink};
pub use crate::types::{BalanceCheck, PaymentResult, PaymentStatus, TransactionRecord};
pub use crate::utils::{lamports_to_sol, parse_address, sol_to_lamports};
