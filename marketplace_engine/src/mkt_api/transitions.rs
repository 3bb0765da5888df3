//! Sub-order status transition rules.
//!
//! The rules are a single table keyed by `(role, from)`, giving the set of statuses that role may move a sub-order
//! to. On top of the table:
//!
//! * A store can never set `Pending`, `Failed`, `Refunded` or `Completed`. Completing an order is the customer's call,
//!   and the others belong to checkout or the payment gateway.
//! * A store re-submitting the current status is accepted as a no-op.
//! * A customer re-submitting the current status is rejected like any other move outside the table.
//! * Stores cannot see sub-orders that have not been paid for yet (anything before `Confirmed` on the fulfilment
//!   sequence).
//!
//! | Role     | From       | To                      |
//! |----------|------------|-------------------------|
//! | Customer | Confirmed  | Cancelled               |
//! | Customer | Shipped    | Completed               |
//! | Store    | Confirmed  | Processing, Cancelled   |
//! | Store    | Processing | Delivering              |
//! | Store    | Delivering | Shipped                 |
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{ActorRole, SubOrderStatus};

use SubOrderStatus::*;

pub const ALL_STATUSES: [SubOrderStatus; 9] =
    [Pending, Confirmed, Processing, Delivering, Shipped, Completed, Cancelled, Failed, Refunded];

const STORE_PROHIBITED: [SubOrderStatus; 4] = [Pending, Failed, Refunded, Completed];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The status changes and a history entry is recorded
    Move,
    /// The requested status is already the current one; nothing is written
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("A {role} cannot change a sub-order from {from} to {to}")]
pub struct InvalidTransition {
    pub role: ActorRole,
    pub from: SubOrderStatus,
    pub to: SubOrderStatus,
}

/// The statuses `role` may move a sub-order to from `from`.
pub fn allowed_targets(role: ActorRole, from: SubOrderStatus) -> &'static [SubOrderStatus] {
    match (role, from) {
        (ActorRole::Customer, Confirmed) => &[Cancelled],
        (ActorRole::Customer, Shipped) => &[Completed],
        (ActorRole::Store, Confirmed) => &[Processing, Cancelled],
        (ActorRole::Store, Processing) => &[Delivering],
        (ActorRole::Store, Delivering) => &[Shipped],
        _ => &[],
    }
}

/// Whether a sub-order in `status` is visible to actors with the given role at all.
pub fn is_visible_to(role: ActorRole, status: SubOrderStatus) -> bool {
    match role {
        ActorRole::Customer => true,
        ActorRole::Store => !status.is_before(Confirmed),
    }
}

pub fn check_transition(
    role: ActorRole,
    from: SubOrderStatus,
    to: SubOrderStatus,
) -> Result<Transition, InvalidTransition> {
    let invalid = InvalidTransition { role, from, to };
    if role == ActorRole::Store {
        if STORE_PROHIBITED.contains(&to) {
            return Err(invalid);
        }
        if from == to {
            return Ok(Transition::Unchanged);
        }
    }
    if allowed_targets(role, from).contains(&to) {
        Ok(Transition::Move)
    } else {
        Err(invalid)
    }
}
