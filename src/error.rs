//! Error taxonomy shared by the store, the ledger and the service.

use crate::account::AccountId;
use crate::account::BalanceError;
use crate::context::Interrupted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, parse_display::Display)]
#[display(style = "lowercase")]
pub enum Entity {
    Account,
    Item,
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("{entity} not found key={key}")]
    NotFound { entity: Entity, key: String },
    #[error("amount must be a positive number of coins amount={amount}")]
    InvalidAmount { amount: i64 },
    #[error("cannot send coins to yourself account={account}")]
    SelfTransfer { account: AccountId },
    #[error("transaction aborted by conflicting writers after attempts={attempts}")]
    Conflict { attempts: u32 },
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error("backing store failure, source_error={0}")]
    Internal(#[from] sqlx::Error),
}

/// Caller-facing classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, parse_display::Display)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    SelfTransfer,
    Conflict,
    CancelledOrTimedOut,
    Internal,
}

impl LedgerError {
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            Self::SelfTransfer { .. } => ErrorKind::SelfTransfer,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::CancelledOrTimedOut,
            Self::Balance(BalanceError::InsufficientFunds { .. }) => ErrorKind::InsufficientFunds,
            Self::Balance(BalanceError::Overflow { .. }) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Business-rule failures abort a transaction and are never retried.
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::InvalidAmount | ErrorKind::InsufficientFunds | ErrorKind::SelfTransfer
        )
    }

    /// Whether the backing store aborted the transaction because of a concurrent writer.
    pub fn is_serialization_failure(&self) -> bool {
        match self {
            Self::Internal(error) => crate::storage::is_serialization_failure(error),
            _ => false,
        }
    }
}

impl From<Interrupted> for LedgerError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}
