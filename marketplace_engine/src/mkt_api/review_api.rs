use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewReview, Review, SubOrderStatus},
    mkt_api::{
        errors::MarketplaceError,
        order_objects::ReviewStatus,
        review_window::ReviewWindow,
    },
    traits::{OrderManagement, ReviewManagement},
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// `ReviewApi` decides whether the items of a completed sub-order can still be reviewed, and records reviews and
/// seller replies.
pub struct ReviewApi<B> {
    db: B,
    window: ReviewWindow,
}

impl<B> Debug for ReviewApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi ({} day window)", self.window.length().num_days())
    }
}

impl<B> ReviewApi<B> {
    pub fn new(db: B, window: ReviewWindow) -> Self {
        Self { db, window }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn window(&self) -> ReviewWindow {
        self.window
    }
}

impl<B> ReviewApi<B>
where B: OrderManagement + ReviewManagement
{
    pub async fn review_status(&self, customer_id: i64, sub_order_id: i64) -> Result<ReviewStatus, MarketplaceError> {
        self.review_status_at(customer_id, sub_order_id, Utc::now()).await
    }

    /// Reports whether the customer can still review the sub-order's items as of `now`.
    ///
    /// Asking about a sub-order that has not been completed yet is a `BadRequest`, rather than a closed window.
    pub async fn review_status_at(
        &self,
        customer_id: i64,
        sub_order_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewStatus, MarketplaceError> {
        let details = self
            .db
            .fetch_sub_order_details(sub_order_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Sub-order {sub_order_id} does not exist")))?;
        if details.customer_id != customer_id {
            return Err(MarketplaceError::Forbidden(format!("Sub-order {sub_order_id} does not belong to you")));
        }
        if details.status() != SubOrderStatus::Completed {
            return Err(MarketplaceError::BadRequest(format!(
                "Sub-order {sub_order_id} is {}. Only completed orders can be reviewed.",
                details.status()
            )));
        }
        Ok(self.window.evaluate(&details, now))
    }

    pub async fn create_review(&self, customer_id: i64, review: NewReview) -> Result<Review, MarketplaceError> {
        self.create_review_at(customer_id, review, Utc::now()).await
    }

    /// Records the customer's review of one order item.
    ///
    /// The item must belong to the customer, its sub-order must be completed, the review window must still be open,
    /// the item must not have been reviewed already, and the rating must be between 1 and 5.
    pub async fn create_review_at(
        &self,
        customer_id: i64,
        mut review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<Review, MarketplaceError> {
        let item_id = review.order_item_id;
        let ctx = self
            .db
            .fetch_review_context(item_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Order item {item_id} does not exist")))?;
        if ctx.customer_id != customer_id {
            return Err(MarketplaceError::Forbidden(format!("Order item {item_id} does not belong to you")));
        }
        let sub_order = &ctx.sub_order;
        if sub_order.status != SubOrderStatus::Completed {
            return Err(MarketplaceError::BadRequest(format!(
                "Order item {item_id} cannot be reviewed until the order is completed"
            )));
        }
        if !self.window.is_open(sub_order.status, sub_order.completed_at, now) {
            debug!("⭐️ Review window for sub-order #{} has closed", sub_order.id);
            return Err(MarketplaceError::BadRequest("The review window for this order has closed".into()));
        }
        if ctx.review.is_some() {
            return Err(MarketplaceError::BadRequest(format!("Order item {item_id} has already been reviewed")));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&review.rating) {
            return Err(MarketplaceError::BadRequest(format!(
                "Ratings must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        review.comment = review.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        let review = self.db.insert_review(customer_id, review).await?;
        info!("⭐️ Customer #{customer_id} rated order item #{item_id} {}/5", review.rating);
        Ok(review)
    }

    /// Records the store's public reply to a review of one of its items. Each review gets one reply.
    pub async fn reply_to_review(&self, store_id: i64, review_id: i64, reply: &str) -> Result<Review, MarketplaceError> {
        let existing = self
            .db
            .fetch_review(review_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Review {review_id} does not exist")))?;
        if existing.store_id != store_id {
            return Err(MarketplaceError::Forbidden(format!("Review {review_id} is not about your store")));
        }
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(MarketplaceError::BadRequest("A reply cannot be empty".into()));
        }
        if existing.review.seller_reply.is_some() {
            return Err(MarketplaceError::BadRequest(format!("Review {review_id} already has a reply")));
        }
        let review = self.db.set_seller_reply(review_id, reply).await?;
        info!("⭐️ Store #{store_id} replied to review #{review_id}");
        Ok(review)
    }
}
