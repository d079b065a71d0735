use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::account::AccountId;
use crate::amount::PositiveAmount;
use crate::error::LedgerError;

/// One committed coin transfer. Append-only, never updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, parse_display::Display)]
#[display("transfer=(id={id} sender={sender} receiver={receiver} amount={amount})")]
pub struct TransferRecord {
    pub id: i64,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: PositiveAmount,
    pub created_at: DateTime<Utc>,
}

/// Appends a transfer record on the supplied connection, normally an open transaction.
///
/// # Errors
///
/// Returns an error if the statement fails ([`LedgerError::Internal`]).
pub async fn append(
    conn: &mut SqliteConnection,
    sender: AccountId,
    receiver: AccountId,
    amount: PositiveAmount,
) -> Result<TransferRecord, LedgerError> {
    let created_at = Utc::now();
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO transfers (sender_id, receiver_id, amount, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(sender)
    .bind(receiver)
    .bind(amount.as_inner())
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(TransferRecord {
        id,
        sender,
        receiver,
        amount,
        created_at,
    })
}
