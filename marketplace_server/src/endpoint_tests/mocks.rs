use marketplace_engine::{
    db_types::{NewOrder, NewReview, NewStore, NewStoreTransfer, Payment, Review, Store, StoreTransfer, SubOrder},
    order_objects::{PlacedOrder, SubOrderDetails},
    traits::{
        AppliedPayment,
        BackendError,
        OrderManagement,
        PaymentOutcome,
        PaymentReconciliation,
        PayoutStateUpdate,
        ReviewContext,
        ReviewManagement,
        ReviewWithStore,
        StatusChange,
        TransferSettlement,
    },
};
use mockall::mock;

mock! {
    pub MarketBackend {}
    impl OrderManagement for MarketBackend {
        async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, BackendError>;
        async fn fetch_sub_order_details(&self, sub_order_id: i64) -> Result<Option<SubOrderDetails>, BackendError>;
        async fn apply_status_change(&self, change: StatusChange) -> Result<SubOrder, BackendError>;
        async fn fetch_store(&self, store_id: i64) -> Result<Option<Store>, BackendError>;
        async fn fetch_store_for_owner(&self, owner_id: i64) -> Result<Option<Store>, BackendError>;
        async fn insert_store(&self, store: NewStore) -> Result<Store, BackendError>;
    }
    impl ReviewManagement for MarketBackend {
        async fn fetch_review_context(&self, order_item_id: i64) -> Result<Option<ReviewContext>, BackendError>;
        async fn insert_review(&self, customer_id: i64, review: NewReview) -> Result<Review, BackendError>;
        async fn fetch_review(&self, review_id: i64) -> Result<Option<ReviewWithStore>, BackendError>;
        async fn set_seller_reply(&self, review_id: i64, reply: &str) -> Result<Review, BackendError>;
    }
}

mock! {
    pub Reconciler {}
    impl PaymentReconciliation for Reconciler {
        async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, BackendError>;
        async fn apply_payment_outcome(&self, outcome: PaymentOutcome) -> Result<Option<AppliedPayment>, BackendError>;
        async fn fetch_store_by_account_id(&self, account_id: &str) -> Result<Option<Store>, BackendError>;
        async fn update_store_payout_state(&self, store: &Store, update: PayoutStateUpdate) -> Result<Option<Store>, BackendError>;
        async fn disconnect_store_account(&self, store_id: i64) -> Result<Option<Store>, BackendError>;
        async fn insert_store_transfer(&self, transfer: NewStoreTransfer) -> Result<StoreTransfer, BackendError>;
        async fn fetch_transfers_for_payment(&self, payment_id: i64) -> Result<Vec<StoreTransfer>, BackendError>;
        async fn fetch_store_transfer(&self, payment_intent_id: &str, destination_account_id: &str) -> Result<Option<StoreTransfer>, BackendError>;
        async fn settle_store_transfer(&self, settlement: TransferSettlement) -> Result<Option<StoreTransfer>, BackendError>;
    }
}
