use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, NewStoreTransfer, Payment, PaymentStatus, StoreTransfer, TransferStatus},
    traits::{BackendError, TransferSettlement},
};

pub async fn insert_payment(
    order_id: i64,
    payment_intent_id: &str,
    amount: Money,
    currency: &str,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, payment_intent_id, status, amount, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(payment_intent_id)
    .bind(PaymentStatus::Pending)
    .bind(amount)
    .bind(currency)
    .bind(created_at)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment_by_intent_id(
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Moves the payment from `expected` to `new_status`. Returns `None` if the payment was not in `expected`.
///
/// `paid_at` and `failure_message` are only overwritten when a value is supplied.
pub async fn update_status_if(
    payment_id: i64,
    expected: PaymentStatus,
    new_status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    failure_message: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                paid_at = COALESCE($2, paid_at),
                failure_message = COALESCE($3, failure_message),
                updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(paid_at)
    .bind(failure_message)
    .bind(now)
    .bind(payment_id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn set_total_commission(
    payment_id: i64,
    total_commission: Money,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment = sqlx::query_as("UPDATE payments SET total_commission = $1 WHERE id = $2 RETURNING *")
        .bind(total_commission)
        .bind(payment_id)
        .fetch_one(conn)
        .await?;
    Ok(payment)
}

pub async fn insert_store_transfer(
    transfer: &NewStoreTransfer,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<StoreTransfer, BackendError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO store_transfers
                (payment_id, store_id, sub_order_id, amount, commission, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(transfer.payment_id)
    .bind(transfer.store_id)
    .bind(transfer.sub_order_id)
    .bind(transfer.amount)
    .bind(transfer.commission)
    .bind(TransferStatus::Pending)
    .bind(created_at)
    .bind(created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => BackendError::TransferAlreadyExists {
            payment_id: transfer.payment_id,
            store_id: transfer.store_id,
        },
        _ => BackendError::from(e),
    })?;
    debug!(
        "🗃️ Transfer of {} (commission {}) to store #{} recorded for payment #{}",
        transfer.amount, transfer.commission, transfer.store_id, transfer.payment_id
    );
    Ok(result)
}

pub async fn fetch_transfers_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StoreTransfer>, sqlx::Error> {
    let transfers = sqlx::query_as("SELECT * FROM store_transfers WHERE payment_id = $1 ORDER BY id")
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
    Ok(transfers)
}

pub async fn fetch_store_transfer(
    payment_intent_id: &str,
    destination_account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreTransfer>, sqlx::Error> {
    let transfer = sqlx::query_as(
        r#"
            SELECT store_transfers.* FROM store_transfers
                JOIN payments ON payments.id = store_transfers.payment_id
                JOIN stores ON stores.id = store_transfers.store_id
            WHERE payments.payment_intent_id = $1 AND stores.payout_account_id = $2
        "#,
    )
    .bind(payment_intent_id)
    .bind(destination_account_id)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}

/// Fails the sub-order's store transfer if it has not been paid out yet.
///
/// Returns `None` if there was no pending transfer.
pub async fn fail_pending_transfer(
    sub_order_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreTransfer>, sqlx::Error> {
    let transfer = sqlx::query_as(
        r#"
            UPDATE store_transfers SET
                status = $1,
                failure_message = $2,
                updated_at = $3
            WHERE sub_order_id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(TransferStatus::Failed)
    .bind(reason)
    .bind(now)
    .bind(sub_order_id)
    .bind(TransferStatus::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}

/// Returns `None` if the transfer was not in `settlement.expected_status`.
pub async fn settle_transfer_if(
    settlement: &TransferSettlement,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreTransfer>, sqlx::Error> {
    let transferred_at = (settlement.new_status == TransferStatus::Completed).then_some(now);
    let transfer = sqlx::query_as(
        r#"
            UPDATE store_transfers SET
                status = $1,
                external_transfer_id = $2,
                transferred_at = COALESCE($3, transferred_at),
                failure_message = $4,
                updated_at = $5
            WHERE id = $6 AND status = $7
            RETURNING *;
        "#,
    )
    .bind(settlement.new_status)
    .bind(&settlement.external_transfer_id)
    .bind(transferred_at)
    .bind(settlement.failure_message.as_deref())
    .bind(now)
    .bind(settlement.transfer_id)
    .bind(settlement.expected_status)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}
