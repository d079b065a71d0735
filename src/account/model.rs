use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(
    Debug,
    Copy,
    Clone,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
    parse_display::Display,
    parse_display::FromStr,
)]
#[sqlx(transparent)]
#[display("{0}")]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Case-normalized unique display name of an account.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, sqlx::Type, parse_display::Display)]
#[sqlx(transparent)]
#[display("{0}")]
pub struct AccountName(String);

impl AccountName {
    /// Trims surrounding whitespace and lower-cases `raw`.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Account {
    pub(in crate::account) id: AccountId,
    pub(in crate::account) name: AccountName,
    pub(in crate::account) balance: i64,
    pub(in crate::account) credential: String,
    pub(in crate::account) created_at: DateTime<Utc>,
}

impl Account {
    /// A not yet persisted account holding `starting_balance` coins.
    ///
    /// `credential` is opaque material owned by the authentication layer.
    pub fn new(name: AccountName, credential: String, starting_balance: i64) -> Self {
        Self {
            id: AccountId::random(),
            name,
            balance: starting_balance,
            credential,
            created_at: Utc::now(),
        }
    }

    pub const fn id(&self) -> AccountId {
        self.id
    }

    pub const fn name(&self) -> &AccountName {
        &self.name
    }

    pub const fn balance(&self) -> i64 {
        self.balance
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Balance of one account as read inside an open transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, parse_display::Display)]
#[display("account={account_id} balance={coins}")]
pub struct AccountBalance {
    pub(in crate::account) account_id: AccountId,
    pub(in crate::account) coins: i64,
}

impl AccountBalance {
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub const fn coins(&self) -> i64 {
        self.coins
    }
}
