use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewStore, Store},
    traits::PayoutStateUpdate,
};

pub async fn insert_store(
    store: NewStore,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Store, sqlx::Error> {
    let store = sqlx::query_as(
        r#"
            INSERT INTO stores (owner_id, name, payout_account_id, commission_bps, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(store.owner_id)
    .bind(store.name)
    .bind(store.payout_account_id)
    .bind(store.commission_bps)
    .bind(created_at)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    Ok(store)
}

pub async fn fetch_store(store_id: i64, conn: &mut SqliteConnection) -> Result<Option<Store>, sqlx::Error> {
    let store = sqlx::query_as("SELECT * FROM stores WHERE id = $1").bind(store_id).fetch_optional(conn).await?;
    Ok(store)
}

pub async fn fetch_store_for_owner(owner_id: i64, conn: &mut SqliteConnection) -> Result<Option<Store>, sqlx::Error> {
    let store =
        sqlx::query_as("SELECT * FROM stores WHERE owner_id = $1").bind(owner_id).fetch_optional(conn).await?;
    Ok(store)
}

pub async fn fetch_store_by_account_id(
    account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Store>, sqlx::Error> {
    let store = sqlx::query_as("SELECT * FROM stores WHERE payout_account_id = $1")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    Ok(store)
}

/// Writes the payout columns of `expected`, provided they still hold the values in `expected`.
///
/// Returns `None` if the store does not exist, or if any of its payout columns changed since `expected` was read.
pub async fn update_payout_state_if(
    expected: &Store,
    update: &PayoutStateUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Store>, sqlx::Error> {
    // IS compares NULLs as equal
    let store = sqlx::query_as(
        r#"
            UPDATE stores SET
                payout_enabled = $1,
                payout_account_status = $2,
                card_payments_capability = $3,
                transfers_capability = $4,
                updated_at = $5
            WHERE id = $6
                AND payout_enabled = $7
                AND payout_account_status IS $8
                AND card_payments_capability IS $9
                AND transfers_capability IS $10
            RETURNING *;
        "#,
    )
    .bind(update.payout_enabled)
    .bind(update.status)
    .bind(update.card_payments_capability.as_deref())
    .bind(update.transfers_capability.as_deref())
    .bind(now)
    .bind(expected.id)
    .bind(expected.payout_enabled)
    .bind(expected.payout_account_status)
    .bind(expected.card_payments_capability.as_deref())
    .bind(expected.transfers_capability.as_deref())
    .fetch_optional(conn)
    .await?;
    Ok(store)
}

/// Returns `None` if the store does not exist, or has no payout account.
pub async fn disconnect_if_connected(
    store_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Store>, sqlx::Error> {
    let store = sqlx::query_as(
        r#"
            UPDATE stores SET
                payout_account_id = NULL,
                payout_enabled = FALSE,
                payout_account_status = NULL,
                card_payments_capability = NULL,
                transfers_capability = NULL,
                updated_at = $1
            WHERE id = $2 AND payout_account_id IS NOT NULL
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(store_id)
    .fetch_optional(conn)
    .await?;
    Ok(store)
}
