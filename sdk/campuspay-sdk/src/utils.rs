use crate::core::constants::{LAMPORTS_PER_SOL, SOL_DECIMALS};
use crate::error::{PaymentError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

//=============================================================================
// Amount / Unit Conversion
//=============================================================================

/// Convert a SOL amount to lamports, truncating any sub-lamport remainder so the
/// result never exceeds what the user authorized.
///
/// Fails for non-positive amounts, amounts below one lamport, and amounts that do
/// not fit in a `u64` lamport count.
pub fn sol_to_lamports(amount: Decimal) -> Result<u64> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "{amount} must be greater than zero"
        )));
    }

    let lamports = amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .map(|scaled| scaled.trunc())
        .and_then(|scaled| scaled.to_u64())
        .ok_or_else(|| PaymentError::InvalidAmount(format!("{amount} SOL is too large")))?;

    if lamports < 1 {
        return Err(PaymentError::InvalidAmount(format!(
            "{amount} SOL is smaller than one lamport"
        )));
    }
    Ok(lamports)
}

/// Convert lamports to SOL. Exact: every lamport count is representable.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(lamports as i128, SOL_DECIMALS).normalize()
}

/// Parse a decimal SOL string such as `"0.025"`.
pub fn parse_sol(text: &str) -> Result<Decimal> {
    Decimal::from_str(text.trim())
        .map_err(|e| PaymentError::InvalidAmount(format!("{text:?} is not a number: {e}")))
}

//=============================================================================
// Address Helpers
//=============================================================================

/// Parse a base58 ledger address.
pub fn parse_address(text: &str) -> Result<Pubkey> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PaymentError::InvalidAddress("address is empty".to_string()));
    }
    Pubkey::from_str(text).map_err(|e| PaymentError::InvalidAddress(format!("{text}: {e}")))
}
