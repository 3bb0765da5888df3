use crate::{
    db_types::{NewStoreTransfer, Payment, Store, StoreTransfer},
    traits::{
        data_objects::{AppliedPayment, PaymentOutcome, PayoutStateUpdate, TransferSettlement},
        BackendError,
    },
};

/// Backend behaviour needed to reconcile payment gateway events with marketplace state.
///
/// Every mutating method is a compare-and-set: it states what it expects the current state to be, and reports
/// `None` (with nothing written) if another writer got there first. This is what makes replaying the same gateway
/// event safe, even when two deliveries race.
#[allow(async_fn_in_trait)]
pub trait PaymentReconciliation {
    async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, BackendError>;

    /// Applies a payment outcome in a single transaction:
    /// * The payment status moves from `expected_status` to `new_status`. `paid_at` is set when the payment succeeds.
    /// * Every sub-order of the order in one of the `affected_sub_orders` statuses moves to `sub_order_status`, with
    ///   a history entry that has no actor.
    /// * If `create_transfers` is set, a store transfer is created for every sub-order that moved, and the payment's
    ///   total commission is updated.
    /// * If `fail_pending_transfers` is set, the pending store transfer of every sub-order that moved is failed.
    ///
    /// Returns `None` if the payment was no longer in `expected_status`.
    async fn apply_payment_outcome(&self, outcome: PaymentOutcome) -> Result<Option<AppliedPayment>, BackendError>;

    async fn fetch_store_by_account_id(&self, account_id: &str) -> Result<Option<Store>, BackendError>;

    /// Overwrites the payout columns of `store`, provided they still hold the values in `store`.
    ///
    /// Returns `None` if the payout columns changed since `store` was read.
    async fn update_store_payout_state(
        &self,
        store: &Store,
        update: PayoutStateUpdate,
    ) -> Result<Option<Store>, BackendError>;

    /// Clears the store's payout account, disables payouts and clears the account and capability statuses.
    ///
    /// Returns `None` if the store had no payout account to begin with.
    async fn disconnect_store_account(&self, store_id: i64) -> Result<Option<Store>, BackendError>;

    /// Creates a pending store transfer. Fails with [`BackendError::TransferAlreadyExists`] if the store already has
    /// a transfer for this payment.
    async fn insert_store_transfer(&self, transfer: NewStoreTransfer) -> Result<StoreTransfer, BackendError>;

    async fn fetch_transfers_for_payment(&self, payment_id: i64) -> Result<Vec<StoreTransfer>, BackendError>;

    /// Finds the store transfer for the payment with the given intent id, paid out to the given connected account.
    async fn fetch_store_transfer(
        &self,
        payment_intent_id: &str,
        destination_account_id: &str,
    ) -> Result<Option<StoreTransfer>, BackendError>;

    /// Returns `None` if the transfer was no longer in `expected_status`.
    async fn settle_store_transfer(
        &self,
        settlement: TransferSettlement,
    ) -> Result<Option<StoreTransfer>, BackendError>;
}
