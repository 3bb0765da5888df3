//! # Marketplace engine public API
//!
//! The `mkt_api` module exposes the programmatic API for the marketplace engine. The API is modular, so that clients
//! can pick and choose the functionality they want.
//!
//! * [`order_status_api`] records checkouts and moves sub-orders through their fulfilment lifecycle on behalf of
//!   customers and stores.
//! * [`webhook_api`] verifies payment gateway webhooks and reconciles them with payments, sub-orders, store transfers
//!   and store payout accounts.
//! * [`review_api`] manages the review window for completed sub-orders, reviews and seller replies.
//!
//! The other submodules in this module are support types and pure rule sets.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use marketplace_engine::{db_types::Actor, order_objects::StatusChangeRequest, OrderStatusApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements OrderManagement
//! let api = OrderStatusApi::new(db, EventProducers::default());
//! let request = StatusChangeRequest::new(SubOrderStatus::Processing);
//! let details = api.request_transition(&Actor::store(user_id, store_id), sub_order_id, request).await?;
//! ```
pub mod errors;
pub mod gateway_events;
pub mod order_objects;
pub mod order_status_api;
pub mod review_api;
pub mod review_window;
pub mod transitions;
pub mod webhook_api;
