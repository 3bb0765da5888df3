use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   SubOrderStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum SubOrderStatus {
    /// Created at checkout, waiting for the payment to clear. Only the customer can see the sub-order at this point.
    Pending,
    /// The payment has cleared and the store can start working on the sub-order.
    Confirmed,
    /// The store is preparing the items.
    Processing,
    /// The items have been handed to the carrier.
    Delivering,
    /// The carrier reports the parcel as shipped.
    Shipped,
    /// The customer confirmed receipt.
    Completed,
    /// Cancelled by the customer or the store before processing started.
    Cancelled,
    /// The payment for the order failed.
    Failed,
    /// The payment for the order was refunded.
    Refunded,
}

/// The linear fulfilment sequence. A status' position in this list is its rank. `Cancelled`, `Failed` and `Refunded`
/// are out-of-band terminal states and have no rank.
pub const FULFILLMENT_SEQUENCE: [SubOrderStatus; 6] = [
    SubOrderStatus::Pending,
    SubOrderStatus::Confirmed,
    SubOrderStatus::Processing,
    SubOrderStatus::Delivering,
    SubOrderStatus::Shipped,
    SubOrderStatus::Completed,
];

impl SubOrderStatus {
    pub fn rank(&self) -> Option<usize> {
        FULFILLMENT_SEQUENCE.iter().position(|s| s == self)
    }

    /// True if both statuses are on the fulfilment sequence and `self` comes strictly before `other`.
    pub fn is_before(&self, other: SubOrderStatus) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed | Self::Refunded)
    }
}

impl Display for SubOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Delivering => "Delivering",
            Self::Shipped => "Shipped",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
            Self::Refunded => "Refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for SubOrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "delivering" => Ok(Self::Delivering),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ConversionError(format!("Invalid sub-order status: {s}"))),
        }
    }
}

//--------------------------------------        Actor          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    Customer,
    Store,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Customer => write!(f, "customer"),
            ActorRole::Store => write!(f, "store"),
        }
    }
}

/// The caller of a status change.
///
/// `owner_id` is the id used for ownership checks: the customer id for customers, and the store id for store owners.
/// `user_id` is the identity of the person acting, and is what ends up in the status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: ActorRole,
    pub user_id: i64,
    pub owner_id: i64,
}

impl Actor {
    pub fn customer(customer_id: i64) -> Self {
        Self { role: ActorRole::Customer, user_id: customer_id, owner_id: customer_id }
    }

    pub fn store(user_id: i64, store_id: i64) -> Self {
        Self { role: ActorRole::Store, user_id, owner_id: store_id }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{} (user #{})", self.role, self.owner_id, self.user_id)
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub total_amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       SubOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SubOrder {
    pub id: i64,
    pub order_id: i64,
    pub store_id: i64,
    /// Human-readable order number, e.g. `ORD-000017-2`
    pub number: String,
    pub status: SubOrderStatus,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    /// Sum of the line items belonging to this store
    pub subtotal: Money,
    /// Set if, and only if, the status is `Completed`
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for SubOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{}, {})", self.number, self.id, self.status)
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub sub_order_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------  OrderStatusHistory   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub id: i64,
    pub sub_order_id: i64,
    pub status: SubOrderStatus,
    pub notes: Option<String>,
    /// The user that requested the change. `None` for changes driven by the payment gateway.
    pub changed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Succeeded => write!(f, "Succeeded"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    /// The payment intent id assigned by the gateway
    pub payment_intent_id: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub currency: String,
    /// The platform's cut across all stores in the order
    pub total_commission: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    TransferStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "Pending"),
            TransferStatus::Completed => write!(f, "Completed"),
            TransferStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------     StoreTransfer     ---------------------------------------------------------
/// A store's net earnings from one payment. There is at most one transfer per (payment, store) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StoreTransfer {
    pub id: i64,
    pub payment_id: i64,
    pub store_id: i64,
    pub sub_order_id: i64,
    /// Net amount owed to the store
    pub amount: Money,
    pub commission: Money,
    pub status: TransferStatus,
    pub external_transfer_id: Option<String>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStoreTransfer {
    pub payment_id: i64,
    pub store_id: i64,
    pub sub_order_id: i64,
    pub amount: Money,
    pub commission: Money,
}

impl NewStoreTransfer {
    /// Splits `subtotal` into the platform commission (rounded down) and the store's net amount.
    pub fn split(payment_id: i64, sub_order: &SubOrder, commission_bps: i64) -> Self {
        let commission = sub_order.subtotal.basis_points(commission_bps);
        Self {
            payment_id,
            store_id: sub_order.store_id,
            sub_order_id: sub_order.id,
            amount: sub_order.subtotal - commission,
            commission,
        }
    }
}

//--------------------------------------  PayoutAccountStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutAccountStatus {
    Pending,
    Restricted,
    Complete,
}

impl Display for PayoutAccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutAccountStatus::Pending => write!(f, "pending"),
            PayoutAccountStatus::Restricted => write!(f, "restricted"),
            PayoutAccountStatus::Complete => write!(f, "complete"),
        }
    }
}

//--------------------------------------         Store         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    /// The user id of the store owner
    pub owner_id: i64,
    pub name: String,
    pub payout_enabled: bool,
    /// The connected account id at the payment gateway
    pub payout_account_id: Option<String>,
    pub payout_account_status: Option<PayoutAccountStatus>,
    /// Last reported status of the gateway's `card_payments` capability
    pub card_payments_capability: Option<String>,
    /// Last reported status of the gateway's `transfers` capability
    pub transfers_capability: Option<String>,
    /// Platform commission in basis points
    pub commission_bps: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStore {
    pub owner_id: i64,
    pub name: String,
    pub payout_account_id: Option<String>,
    pub commission_bps: i64,
}

impl NewStore {
    pub fn new<S: Into<String>>(owner_id: i64, name: S, commission_bps: i64) -> Self {
        Self { owner_id, name: name.into(), payout_account_id: None, commission_bps }
    }

    pub fn with_payout_account<S: Into<String>>(mut self, account_id: S) -> Self {
        self.payout_account_id = Some(account_id.into());
        self
    }
}

//--------------------------------------        Review         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub order_item_id: i64,
    pub customer_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub seller_reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub order_item_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_name: S, quantity: i64, unit_price: Money) -> Self {
        Self { product_name: product_name.into(), quantity, unit_price }
    }
}

/// All the items from one store in a checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubOrder {
    pub store_id: i64,
    pub items: Vec<NewOrderItem>,
}

impl NewSubOrder {
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|i| i.unit_price * i.quantity).sum()
    }
}

/// A checked-out cart: one sub-order per store, paid for with a single payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub sub_orders: Vec<NewSubOrder>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: i64, payment_intent_id: S) -> Self {
        Self { customer_id, currency: "USD".to_string(), payment_intent_id: payment_intent_id.into(), sub_orders: vec![] }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_sub_order(mut self, store_id: i64, items: Vec<NewOrderItem>) -> Self {
        self.sub_orders.push(NewSubOrder { store_id, items });
        self
    }

    pub fn total_amount(&self) -> Money {
        self.sub_orders.iter().map(NewSubOrder::subtotal).sum()
    }
}
