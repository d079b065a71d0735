//! Free functions that mutate a supplied [`AccountBalance`].
//!
//! The ledger reads balances inside a transaction, applies these ops in memory and writes the
//! results back before committing. Keeping the arithmetic here keeps the non-negativity invariant
//! in one place: no op ever produces a negative balance.

use crate::account::AccountBalance;
use crate::amount::PositiveAmount;

#[derive(thiserror::Error, Debug)]
pub enum BalanceError {
    #[error("insufficient funds, need {amount} in {balance}")]
    InsufficientFunds {
        balance: AccountBalance,
        amount: PositiveAmount,
    },
    #[error("overflow while applying {amount} to {balance}")]
    Overflow {
        balance: AccountBalance,
        amount: PositiveAmount,
    },
}

/// Subtracts `amount` from the balance.
///
/// # Errors
///
/// Returns an error if:
/// - The balance is less than `amount` ([`BalanceError::InsufficientFunds`]).
pub fn debit(balance: &mut AccountBalance, amount: PositiveAmount) -> Result<(), BalanceError> {
    if balance.coins < amount.as_inner() {
        return Err(BalanceError::InsufficientFunds {
            balance: *balance,
            amount,
        });
    }
    balance.coins -= amount.as_inner();
    Ok(())
}

/// Adds `amount` to the balance.
///
/// # Errors
///
/// Returns an error if:
/// - Adding `amount` overflows ([`BalanceError::Overflow`]).
pub fn credit(balance: &mut AccountBalance, amount: PositiveAmount) -> Result<(), BalanceError> {
    balance.coins = balance
        .coins
        .checked_add(amount.as_inner())
        .ok_or(BalanceError::Overflow {
            balance: *balance,
            amount,
        })?;
    Ok(())
}
