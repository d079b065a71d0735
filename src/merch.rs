//! Merchandise catalog reads and per-account inventory.

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::account::AccountId;
use crate::error::Entity;
use crate::error::LedgerError;

/// A catalog item. Read-only from the ledger's perspective.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MerchandiseItem {
    pub(crate) id: i64,
    pub name: String,
    pub price: i64,
}

/// Quantity of one item owned by one account after a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, parse_display::Display)]
#[display("inventory=(account={account_id} item={item} quantity={quantity})")]
pub struct InventoryEntry {
    pub account_id: AccountId,
    pub item: String,
    pub quantity: i64,
}

/// Looks a catalog item up by name.
///
/// # Errors
///
/// Returns an error if:
/// - The item is unknown ([`LedgerError::NotFound`]).
/// - The query fails ([`LedgerError::Internal`]).
pub async fn find_item(conn: &mut SqliteConnection, name: &str) -> Result<MerchandiseItem, LedgerError> {
    sqlx::query_as::<_, MerchandiseItem>("SELECT id, name, price FROM merchandise WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Item, name))
}

/// Adds one `item` to the inventory of `account_id`, inserting the entry with quantity 1 on first
/// purchase and incrementing it afterwards.
///
/// # Errors
///
/// Returns an error if the statement fails ([`LedgerError::Internal`]).
pub async fn add_to_inventory(
    conn: &mut SqliteConnection,
    account_id: AccountId,
    item: &MerchandiseItem,
) -> Result<InventoryEntry, LedgerError> {
    let quantity = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO inventory (account_id, merchandise_id, quantity)
        VALUES (?, ?, 1)
        ON CONFLICT (account_id, merchandise_id) DO UPDATE SET quantity = quantity + 1
        RETURNING quantity
        "#,
    )
    .bind(account_id)
    .bind(item.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(InventoryEntry {
        account_id,
        item: item.name.clone(),
        quantity,
    })
}
