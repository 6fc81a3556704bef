use crate::core::connection::SolConnection;
use crate::types::BalanceCheck;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

/// Read the payer's balance once and compare it with `amount + estimated_fee`.
///
/// A failed read is reported as insufficient with a zero balance: the attempt is
/// blocked instead of failing with a network error.
pub async fn check_balance(
    connection: &dyn SolConnection,
    address: &Pubkey,
    amount_lamports: u64,
    estimated_fee_lamports: u64,
) -> BalanceCheck {
    let required = amount_lamports.saturating_add(estimated_fee_lamports);

    let current_balance = match connection.get_balance(address).await {
        Ok(balance) => balance,
        Err(err) => {
            warn!(%address, error = %err, "balance check failed, blocking payment");
            return BalanceCheck {
                sufficient: false,
                current_balance: 0,
                required,
            };
        },
    };

    let sufficient = current_balance >= required;
    debug!(%address, current_balance, required, sufficient, "balance checked");
    BalanceCheck {
        sufficient,
        current_balance,
        required,
    }
}
