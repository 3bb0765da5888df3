//! Marketplace Engine
//!
//! The Marketplace Engine is the core of a multi-store marketplace. Customers buy from several independent stores in
//! a single order. Each store fulfils its own slice of the order (a sub-order), and an external payment gateway
//! moves the money and reports what happened through signed webhook events.
//!
//! The library is divided into these main sections:
//! 1. Backend traits ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). You should never need to
//!    access the database directly. Instead, use the public API provided by the engine. The exception is the data
//!    types used in the database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The engine's public API ([`mod@mkt_api`]):
//!    * [`OrderStatusApi`] moves sub-orders through their fulfilment lifecycle on behalf of customers and stores.
//!    * [`WebhookApi`] verifies and reconciles payment gateway events, idempotently.
//!    * [`ReviewApi`] decides whether a completed sub-order can still be reviewed, and records reviews.
//!
//! The engine also provides a set of events that can be subscribed to (see [`mod@events`]). These are emitted after
//! a sub-order changes status, or after a payment outcome has been applied.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mkt_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use mkt_api::{
    errors::MarketplaceError,
    gateway_events,
    order_objects,
    order_status_api::OrderStatusApi,
    review_api::ReviewApi,
    review_window::ReviewWindow,
    transitions,
    webhook_api::{WebhookApi, WebhookOutcome},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::new_pool, SqliteDatabase};
pub use traits::{BackendError, OrderManagement, PaymentReconciliation, ReviewManagement};
