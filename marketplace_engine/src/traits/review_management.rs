use crate::{
    db_types::{NewReview, Review},
    traits::{
        data_objects::{ReviewContext, ReviewWithStore},
        BackendError,
    },
};

#[allow(async_fn_in_trait)]
pub trait ReviewManagement {
    /// Fetches the order item, its sub-order, the owning customer and the item's review, if it has one.
    async fn fetch_review_context(&self, order_item_id: i64) -> Result<Option<ReviewContext>, BackendError>;

    /// Fails with [`BackendError::ReviewAlreadyExists`] if the item already has a review.
    async fn insert_review(&self, customer_id: i64, review: NewReview) -> Result<Review, BackendError>;

    async fn fetch_review(&self, review_id: i64) -> Result<Option<ReviewWithStore>, BackendError>;

    /// Fails with [`BackendError::ReviewAlreadyReplied`] if the review already has a reply.
    async fn set_seller_reply(&self, review_id: i64, reply: &str) -> Result<Review, BackendError>;
}
