use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

/// Lamports per SOL: the atomic-unit scale of the ledger.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Number of decimal places between SOL and lamports.
pub const SOL_DECIMALS: u32 = 9;

/// SPL memo program (v2).
pub const MEMO_PROGRAM_ID: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Flat fee approximation for a single-signature transfer.
pub const DEFAULT_ESTIMATED_FEE_LAMPORTS: u64 = 5_000;

/// Lifetime of a payment request.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(15 * 60);

/// Payment link scheme.
pub const PAYMENT_LINK_SCHEME: &str = "solana";

// Default cluster for the demos (test network).
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
