use serde::{Deserialize, Serialize};

use crate::db_types::{
    OrderItem,
    Payment,
    PaymentStatus,
    PayoutAccountStatus,
    Review,
    StoreTransfer,
    SubOrder,
    SubOrderStatus,
    TransferStatus,
};

/// A validated status change for a single sub-order.
///
/// The backend applies it only if the sub-order is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub sub_order_id: i64,
    pub from: SubOrderStatus,
    pub to: SubOrderStatus,
    pub notes: Option<String>,
    pub changed_by: Option<i64>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

/// A payment outcome reported by the gateway, and its effect on the order's sub-orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub payment_id: i64,
    /// The payment status the outcome was decided against. The outcome is dropped if the payment has moved on.
    pub expected_status: PaymentStatus,
    pub new_status: PaymentStatus,
    pub failure_message: Option<String>,
    /// Sub-orders currently in one of these statuses are moved to `sub_order_status`
    pub affected_sub_orders: Vec<SubOrderStatus>,
    pub sub_order_status: SubOrderStatus,
    /// Recorded in the status history of every sub-order that moves
    pub notes: String,
    /// Create a store transfer for every sub-order that moves
    pub create_transfers: bool,
    /// Fail the still-pending store transfer of every sub-order that moves, so that it is never paid out
    pub fail_pending_transfers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPayment {
    pub payment: Payment,
    pub sub_orders: Vec<SubOrder>,
    /// Store transfers created or failed by the outcome
    pub transfers: Vec<StoreTransfer>,
}

/// The complete set of payout columns on a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutStateUpdate {
    pub payout_enabled: bool,
    pub status: PayoutAccountStatus,
    pub card_payments_capability: Option<String>,
    pub transfers_capability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettlement {
    pub transfer_id: i64,
    pub expected_status: TransferStatus,
    pub new_status: TransferStatus,
    pub external_transfer_id: String,
    pub failure_message: Option<String>,
}

/// Everything needed to decide whether an order item can be reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewContext {
    pub item: OrderItem,
    pub sub_order: SubOrder,
    pub customer_id: i64,
    pub review: Option<Review>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWithStore {
    #[serde(flatten)]
    pub review: Review,
    pub store_id: i64,
}
