use crate::{
    db_types::{NewOrder, NewStore, Store, SubOrder},
    order_objects::{PlacedOrder, SubOrderDetails},
    traits::{data_objects::StatusChange, BackendError},
};

/// The `OrderManagement` trait defines the behaviour for storing, querying and moving sub-orders through their
/// fulfilment lifecycle.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Records a checked-out cart, in a single atomic transaction:
    /// * the order,
    /// * one `Pending` sub-order per store, each with its seed status history entry,
    /// * the line items,
    /// * a `Pending` payment for the order's payment intent.
    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, BackendError>;

    /// Fetches a sub-order along with its owning customer, line items (and whether each has been reviewed) and its
    /// status history in chronological order.
    async fn fetch_sub_order_details(&self, sub_order_id: i64) -> Result<Option<SubOrderDetails>, BackendError>;

    /// Applies a status change and appends the history entry in a single transaction.
    ///
    /// The update only goes ahead if the sub-order is still in `change.from`; otherwise
    /// [`BackendError::StatusConflict`] is returned and nothing is written.
    ///
    /// `completed_at` is set when moving to `Completed` and cleared for any other status.
    async fn apply_status_change(&self, change: StatusChange) -> Result<SubOrder, BackendError>;

    async fn fetch_store(&self, store_id: i64) -> Result<Option<Store>, BackendError>;

    /// Resolves the store owned by the given user.
    async fn fetch_store_for_owner(&self, owner_id: i64) -> Result<Option<Store>, BackendError>;

    async fn insert_store(&self, store: NewStore) -> Result<Store, BackendError>;
}
