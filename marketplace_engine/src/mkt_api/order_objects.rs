use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusHistory, Payment, SubOrder, SubOrderStatus};

/// The records created when a cart is checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub sub_orders: Vec<SubOrder>,
    pub payment: Payment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemWithReview {
    #[serde(flatten)]
    pub item: OrderItem,
    pub reviewed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubOrderDetails {
    pub sub_order: SubOrder,
    /// The customer that placed the parent order
    pub customer_id: i64,
    pub items: Vec<ItemWithReview>,
    /// Oldest entry first
    pub history: Vec<OrderStatusHistory>,
}

impl SubOrderDetails {
    pub fn status(&self) -> SubOrderStatus {
        self.sub_order.status
    }
}

/// A request to move a sub-order to a new status. Carrier and tracking details are only taken from stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: Option<SubOrderStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl StatusChangeRequest {
    pub fn new(status: SubOrderStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tracking<S: Into<String>>(mut self, carrier: S, tracking_number: S) -> Self {
        self.carrier = Some(carrier.into());
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReviewStatus {
    pub order_item_id: i64,
    pub product_name: String,
    pub reviewed: bool,
}

/// Whether a completed sub-order can still be reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatus {
    pub sub_order_id: i64,
    pub is_within_window: bool,
    pub days_remaining: i64,
    pub can_leave_review: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemReviewStatus>,
}
