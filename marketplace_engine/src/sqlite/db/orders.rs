use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Money, NewOrderItem, Order, OrderItem, OrderStatusHistory, SubOrder, SubOrderStatus},
    order_objects::ItemWithReview,
    traits::StatusChange,
};

pub fn sub_order_number(order_id: i64, position: usize) -> String {
    format!("ORD-{order_id:06}-{position}")
}

pub async fn insert_order(
    customer_id: i64,
    total_amount: Money,
    currency: &str,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (customer_id, total_amount, currency, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(customer_id)
    .bind(total_amount)
    .bind(currency)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Inserts a sub-order in the `Pending` state. The seed history entry is not written here.
pub async fn insert_sub_order(
    order_id: i64,
    store_id: i64,
    number: &str,
    subtotal: Money,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<SubOrder, sqlx::Error> {
    let sub_order = sqlx::query_as(
        r#"
            INSERT INTO sub_orders (order_id, store_id, number, status, subtotal, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(store_id)
    .bind(number)
    .bind(SubOrderStatus::Pending)
    .bind(subtotal)
    .bind(created_at)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    Ok(sub_order)
}

pub async fn insert_order_item(
    sub_order_id: i64,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (sub_order_id, product_name, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(sub_order_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn insert_history(
    sub_order_id: i64,
    status: SubOrderStatus,
    notes: Option<&str>,
    changed_by: Option<i64>,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusHistory, sqlx::Error> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO order_status_history (sub_order_id, status, notes, changed_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(sub_order_id)
    .bind(status)
    .bind(notes)
    .bind(changed_by)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ History entry {status} recorded for sub-order #{sub_order_id}");
    Ok(entry)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_sub_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<SubOrder>, sqlx::Error> {
    let sub_order = sqlx::query_as("SELECT * FROM sub_orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(sub_order)
}

/// Fetches the sub-orders of an order that are in one of the given statuses, or all of them if `statuses` is empty.
pub async fn fetch_sub_orders_for_order(
    order_id: i64,
    statuses: &[SubOrderStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM sub_orders WHERE order_id = ");
    builder.push_bind(order_id);
    if !statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut list = builder.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
        list.push_unseparated(")");
    }
    builder.push(" ORDER BY id");
    let sub_orders = builder.build_query_as::<SubOrder>().fetch_all(conn).await?;
    Ok(sub_orders)
}

#[derive(FromRow)]
struct ItemRow {
    id: i64,
    sub_order_id: i64,
    product_name: String,
    quantity: i64,
    unit_price: Money,
    reviewed: bool,
}

impl From<ItemRow> for ItemWithReview {
    fn from(row: ItemRow) -> Self {
        let item = OrderItem {
            id: row.id,
            sub_order_id: row.sub_order_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        };
        Self { item, reviewed: row.reviewed }
    }
}

pub async fn fetch_items_with_reviews(
    sub_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ItemWithReview>, sqlx::Error> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        r#"
            SELECT
                order_items.*,
                EXISTS (SELECT 1 FROM reviews WHERE reviews.order_item_id = order_items.id) AS reviewed
            FROM order_items
            WHERE sub_order_id = $1
            ORDER BY id
        "#,
    )
    .bind(sub_order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(ItemWithReview::from).collect())
}

/// Status history for the sub-order, oldest first.
pub async fn fetch_history(
    sub_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusHistory>, sqlx::Error> {
    let history = sqlx::query_as("SELECT * FROM order_status_history WHERE sub_order_id = $1 ORDER BY id")
        .bind(sub_order_id)
        .fetch_all(conn)
        .await?;
    Ok(history)
}

/// Moves the sub-order to `change.to` if, and only if, it is still in `change.from`. Returns `None` if the row did
/// not match.
///
/// `completed_at` follows the status: it is set to `now` for `Completed` and cleared for everything else.
pub async fn update_status_if(
    change: &StatusChange,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<SubOrder>, sqlx::Error> {
    let completed_at = (change.to == SubOrderStatus::Completed).then_some(now);
    let sub_order = sqlx::query_as(
        r#"
            UPDATE sub_orders SET
                status = $1,
                completed_at = $2,
                carrier = COALESCE($3, carrier),
                tracking_number = COALESCE($4, tracking_number),
                updated_at = $5
            WHERE id = $6 AND status = $7
            RETURNING *;
        "#,
    )
    .bind(change.to)
    .bind(completed_at)
    .bind(change.carrier.as_deref())
    .bind(change.tracking_number.as_deref())
    .bind(now)
    .bind(change.sub_order_id)
    .bind(change.from)
    .fetch_optional(conn)
    .await?;
    Ok(sub_order)
}
