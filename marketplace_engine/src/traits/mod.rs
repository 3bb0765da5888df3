//! # Backend traits
//!
//! This module defines the interface contracts of the marketplace engine database *backends*. The engine APIs only
//! ever talk to storage through these traits.
//!
//! * [`OrderManagement`] records checkouts, and reads and moves sub-orders through their fulfilment lifecycle.
//! * [`PaymentReconciliation`] applies payment gateway outcomes to payments, sub-orders, store transfers and store
//!   payout accounts.
//! * [`ReviewManagement`] stores product reviews and seller replies.
//!
//! Each method is a single unit of work. Backends must commit it atomically, or not at all.
mod backend_error;
mod order_management;
mod payment_reconciliation;
mod review_management;

pub mod data_objects;

pub use backend_error::BackendError;
pub use data_objects::{
    AppliedPayment,
    PaymentOutcome,
    PayoutStateUpdate,
    ReviewContext,
    ReviewWithStore,
    StatusChange,
    TransferSettlement,
};
pub use order_management::OrderManagement;
pub use payment_reconciliation::PaymentReconciliation;
pub use review_management::ReviewManagement;
