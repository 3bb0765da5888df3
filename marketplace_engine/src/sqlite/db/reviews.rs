use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{NewReview, OrderItem, Review},
    traits::{BackendError, ReviewWithStore},
};

pub async fn fetch_order_item(order_item_id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM order_items WHERE id = $1")
        .bind(order_item_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

pub async fn fetch_review_for_item(
    order_item_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Review>, sqlx::Error> {
    let review = sqlx::query_as("SELECT * FROM reviews WHERE order_item_id = $1")
        .bind(order_item_id)
        .fetch_optional(conn)
        .await?;
    Ok(review)
}

pub async fn insert_review(
    customer_id: i64,
    review: NewReview,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Review, BackendError> {
    let item_id = review.order_item_id;
    let review = sqlx::query_as(
        r#"
            INSERT INTO reviews (order_item_id, customer_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(review.order_item_id)
    .bind(customer_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => BackendError::ReviewAlreadyExists(item_id),
        _ => BackendError::from(e),
    })?;
    Ok(review)
}

#[derive(FromRow)]
struct ReviewRow {
    #[sqlx(flatten)]
    review: Review,
    store_id: i64,
}

pub async fn fetch_review_with_store(
    review_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReviewWithStore>, sqlx::Error> {
    let row: Option<ReviewRow> = sqlx::query_as(
        r#"
            SELECT reviews.*, sub_orders.store_id FROM reviews
                JOIN order_items ON order_items.id = reviews.order_item_id
                JOIN sub_orders ON sub_orders.id = order_items.sub_order_id
            WHERE reviews.id = $1
        "#,
    )
    .bind(review_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| ReviewWithStore { review: r.review, store_id: r.store_id }))
}

/// Returns `None` if the review does not exist or already has a reply.
pub async fn set_reply_if_empty(
    review_id: i64,
    reply: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Review>, sqlx::Error> {
    let review = sqlx::query_as(
        r#"
            UPDATE reviews SET seller_reply = $1, replied_at = $2
            WHERE id = $3 AND seller_reply IS NULL
            RETURNING *;
        "#,
    )
    .bind(reply)
    .bind(now)
    .bind(review_id)
    .fetch_optional(conn)
    .await?;
    Ok(review)
}
