//! Read-mostly account summary: balance, coin history and inventory.
//!
//! [`AccountSummary`] is a derived projection, the unit the summary cache stores. It is never
//! read back by the ledger.

use serde::Deserialize;
use serde::Serialize;
use sqlx::SqliteConnection;
use sqlx::SqlitePool;

use crate::account::AccountId;
use crate::account::store;
use crate::context::Context;
use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub coins: i64,
    pub coin_history: CoinHistory,
    pub inventory: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinHistory {
    pub received: Vec<TransferView>,
    pub sent: Vec<TransferView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub from_user: String,
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
}

#[derive(Clone, Copy)]
enum Direction {
    Received,
    Sent,
}

/// Reads the summary of `account_id` from the backing store.
///
/// All parts are read inside one transaction so they describe the same committed state.
///
/// # Errors
///
/// Returns an error if:
/// - The account does not exist ([`LedgerError::NotFound`]).
/// - `ctx` is cancelled or times out ([`LedgerError::Cancelled`], [`LedgerError::DeadlineExceeded`]).
/// - The store fails ([`LedgerError::Internal`]).
pub async fn read_summary(
    ctx: &Context,
    pool: &SqlitePool,
    account_id: AccountId,
) -> Result<AccountSummary, LedgerError> {
    ctx.run(async {
        let mut tx = pool.begin().await?;

        let coins = store::read_balance(&mut tx, account_id).await?.coins();
        let received = history(&mut tx, account_id, Direction::Received).await?;
        let sent = history(&mut tx, account_id, Direction::Sent).await?;
        let inventory = inventory(&mut tx, account_id).await?;

        tx.commit().await?;
        Ok::<_, LedgerError>(AccountSummary {
            coins,
            coin_history: CoinHistory { received, sent },
            inventory,
        })
    })
    .await?
}

async fn history(
    conn: &mut SqliteConnection,
    account_id: AccountId,
    direction: Direction,
) -> Result<Vec<TransferView>, LedgerError> {
    let sql = match direction {
        Direction::Received => {
            r#"
            SELECT sender.name AS from_user, receiver.name AS to_user, t.amount
              FROM transfers t
              JOIN accounts sender ON t.sender_id = sender.id
              JOIN accounts receiver ON t.receiver_id = receiver.id
             WHERE t.receiver_id = ?
             ORDER BY t.id DESC
            "#
        }
        Direction::Sent => {
            r#"
            SELECT sender.name AS from_user, receiver.name AS to_user, t.amount
              FROM transfers t
              JOIN accounts sender ON t.sender_id = sender.id
              JOIN accounts receiver ON t.receiver_id = receiver.id
             WHERE t.sender_id = ?
             ORDER BY t.id DESC
            "#
        }
    };

    Ok(sqlx::query_as::<_, TransferView>(sql)
        .bind(account_id)
        .fetch_all(&mut *conn)
        .await?)
}

async fn inventory(conn: &mut SqliteConnection, account_id: AccountId) -> Result<Vec<InventoryItem>, LedgerError> {
    Ok(sqlx::query_as::<_, InventoryItem>(
        r#"
        SELECT m.name AS kind, i.quantity
          FROM inventory i
          JOIN merchandise m ON i.merchandise_id = m.id
         WHERE i.account_id = ?
         ORDER BY m.name
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?)
}
