use serde::{Deserialize, Serialize};

use crate::db_types::{ActorRole, Payment, SubOrder, SubOrderStatus};

/// Emitted after a sub-order's status has changed and the change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubOrderStatusChangedEvent {
    pub sub_order: SubOrder,
    pub old_status: SubOrderStatus,
    /// `None` when the payment gateway drove the change
    pub changed_by: Option<(ActorRole, i64)>,
}

impl SubOrderStatusChangedEvent {
    pub fn new(sub_order: SubOrder, old_status: SubOrderStatus, changed_by: Option<(ActorRole, i64)>) -> Self {
        Self { sub_order, old_status, changed_by }
    }
}

/// Emitted after a payment outcome reported by the gateway has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReconciledEvent {
    pub payment: Payment,
    /// The sub-orders whose status was changed as part of the reconciliation
    pub sub_orders: Vec<SubOrder>,
}

impl PaymentReconciledEvent {
    pub fn new(payment: Payment, sub_orders: Vec<SubOrder>) -> Self {
        Self { payment, sub_orders }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    SubOrderStatusChanged(SubOrderStatusChangedEvent),
    PaymentReconciled(PaymentReconciledEvent),
}
