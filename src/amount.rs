use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::error::LedgerError;

/// A strictly positive number of coins.
///
/// This permits to avoid checks on non-positive amounts while applying balance ops.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, parse_display::Display)]
#[display("{0}")]
pub struct PositiveAmount(i64);

impl TryFrom<i64> for PositiveAmount {
    type Error = LedgerError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        Ok(Self(amount))
    }
}

impl PositiveAmount {
    pub const fn as_inner(&self) -> i64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for PositiveAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let amount = i64::deserialize(deserializer)?;
        Self::try_from(amount).map_err(|error| serde::de::Error::custom(error.to_string()))
    }
}
