//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every trait method runs inside its own transaction.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, new_pool, orders, payments, reviews, stores};
use crate::{
    db_types::{
        Money,
        NewOrder,
        NewReview,
        NewStore,
        NewStoreTransfer,
        Payment,
        PaymentStatus,
        Review,
        Store,
        StoreTransfer,
        SubOrder,
    },
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

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `MKT_DATABASE_URL` (or the default url) to connect.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes all connections in the pool. The database cannot be used afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
        trace!("🗃️ Connection pool closed");
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

async fn sub_order_details(
    sub_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<SubOrderDetails>, BackendError> {
    let Some(sub_order) = orders::fetch_sub_order(sub_order_id, conn).await? else {
        return Ok(None);
    };
    let order = orders::fetch_order(sub_order.order_id, conn).await?.ok_or_else(|| {
        error!("🗃️ Sub-order #{sub_order_id} belongs to order #{}, which does not exist", sub_order.order_id);
        BackendError::DatabaseError(format!("Order {} is missing", sub_order.order_id))
    })?;
    let items = orders::fetch_items_with_reviews(sub_order_id, conn).await?;
    let history = orders::fetch_history(sub_order_id, conn).await?;
    Ok(Some(SubOrderDetails { sub_order, customer_id: order.customer_id, items, history }))
}

impl OrderManagement for SqliteDatabase {
    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, BackendError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let total = order.total_amount();
        let new_order = orders::insert_order(order.customer_id, total, &order.currency, now, &mut tx).await?;
        let mut sub_orders = Vec::with_capacity(order.sub_orders.len());
        for (i, so) in order.sub_orders.iter().enumerate() {
            let number = orders::sub_order_number(new_order.id, i + 1);
            let sub_order =
                orders::insert_sub_order(new_order.id, so.store_id, &number, so.subtotal(), now, &mut tx).await?;
            for item in &so.items {
                orders::insert_order_item(sub_order.id, item, &mut tx).await?;
            }
            orders::insert_history(sub_order.id, sub_order.status, Some("Order placed"), None, now, &mut tx).await?;
            sub_orders.push(sub_order);
        }
        let payment =
            payments::insert_payment(new_order.id, &order.payment_intent_id, total, &order.currency, now, &mut tx)
                .await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{} for customer #{} saved with {} sub-orders and payment intent {}",
            new_order.id,
            new_order.customer_id,
            sub_orders.len(),
            payment.payment_intent_id
        );
        Ok(PlacedOrder { order: new_order, sub_orders, payment })
    }

    async fn fetch_sub_order_details(&self, sub_order_id: i64) -> Result<Option<SubOrderDetails>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        sub_order_details(sub_order_id, &mut conn).await
    }

    async fn apply_status_change(&self, change: StatusChange) -> Result<SubOrder, BackendError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let sub_order = orders::update_status_if(&change, now, &mut tx)
            .await?
            .ok_or(BackendError::StatusConflict(change.sub_order_id))?;
        orders::insert_history(
            change.sub_order_id,
            change.to,
            change.notes.as_deref(),
            change.changed_by,
            now,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Sub-order #{} moved from {} to {}", change.sub_order_id, change.from, change.to);
        Ok(sub_order)
    }

    async fn fetch_store(&self, store_id: i64) -> Result<Option<Store>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let store = stores::fetch_store(store_id, &mut conn).await?;
        Ok(store)
    }

    async fn fetch_store_for_owner(&self, owner_id: i64) -> Result<Option<Store>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let store = stores::fetch_store_for_owner(owner_id, &mut conn).await?;
        Ok(store)
    }

    async fn insert_store(&self, store: NewStore) -> Result<Store, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let store = stores::insert_store(store, Utc::now(), &mut conn).await?;
        debug!("🗃️ Store #{} ({}) created for user #{}", store.id, store.name, store.owner_id);
        Ok(store)
    }
}

impl PaymentReconciliation for SqliteDatabase {
    async fn fetch_payment_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<Payment>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_intent_id(payment_intent_id, &mut conn).await?;
        Ok(payment)
    }

    async fn apply_payment_outcome(&self, outcome: PaymentOutcome) -> Result<Option<AppliedPayment>, BackendError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let paid_at = (outcome.new_status == PaymentStatus::Succeeded).then_some(now);
        let updated = payments::update_status_if(
            outcome.payment_id,
            outcome.expected_status,
            outcome.new_status,
            paid_at,
            outcome.failure_message.as_deref(),
            now,
            &mut tx,
        )
        .await?;
        let Some(mut payment) = updated else {
            debug!("🗃️ Payment #{} is no longer {}. Nothing to do.", outcome.payment_id, outcome.expected_status);
            return Ok(None);
        };
        let candidates =
            orders::fetch_sub_orders_for_order(payment.order_id, &outcome.affected_sub_orders, &mut tx).await?;
        let mut moved = Vec::with_capacity(candidates.len());
        for sub_order in candidates {
            let change = StatusChange {
                sub_order_id: sub_order.id,
                from: sub_order.status,
                to: outcome.sub_order_status,
                notes: Some(outcome.notes.clone()),
                changed_by: None,
                carrier: None,
                tracking_number: None,
            };
            // The payment row guards the whole outcome, so the sub-orders cannot have moved since they were read
            let Some(updated) = orders::update_status_if(&change, now, &mut tx).await? else {
                return Err(BackendError::StatusConflict(sub_order.id));
            };
            orders::insert_history(updated.id, updated.status, change.notes.as_deref(), None, now, &mut tx).await?;
            moved.push(updated);
        }
        let mut transfers = Vec::new();
        if outcome.create_transfers {
            for sub_order in &moved {
                let store = stores::fetch_store(sub_order.store_id, &mut tx)
                    .await?
                    .ok_or_else(|| BackendError::DatabaseError(format!("Store {} is missing", sub_order.store_id)))?;
                let transfer = NewStoreTransfer::split(payment.id, sub_order, store.commission_bps);
                transfers.push(payments::insert_store_transfer(&transfer, now, &mut tx).await?);
            }
            let total_commission = transfers.iter().map(|t| t.commission).sum::<Money>();
            payment = payments::set_total_commission(payment.id, total_commission, &mut tx).await?;
        }
        if outcome.fail_pending_transfers {
            for sub_order in &moved {
                if let Some(t) = payments::fail_pending_transfer(sub_order.id, &outcome.notes, now, &mut tx).await? {
                    debug!("🗃️ Pending transfer #{} to store #{} has been cancelled", t.id, t.store_id);
                    transfers.push(t);
                }
            }
        }
        tx.commit().await?;
        info!(
            "🗃️ Payment #{} is now {}. {} sub-orders moved to {}. {} transfers affected.",
            payment.id,
            payment.status,
            moved.len(),
            outcome.sub_order_status,
            transfers.len()
        );
        Ok(Some(AppliedPayment { payment, sub_orders: moved, transfers }))
    }

    async fn fetch_store_by_account_id(&self, account_id: &str) -> Result<Option<Store>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let store = stores::fetch_store_by_account_id(account_id, &mut conn).await?;
        Ok(store)
    }

    async fn update_store_payout_state(
        &self,
        store: &Store,
        update: PayoutStateUpdate,
    ) -> Result<Option<Store>, BackendError> {
        let mut tx = self.pool.begin().await?;
        let updated = stores::update_payout_state_if(store, &update, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        match &updated {
            Some(s) => {
                debug!("🗃️ Store #{} payout state is now {} (enabled: {})", s.id, update.status, s.payout_enabled)
            },
            None => debug!("🗃️ Store #{} payout state changed since it was read. Nothing written.", store.id),
        }
        Ok(updated)
    }

    async fn disconnect_store_account(&self, store_id: i64) -> Result<Option<Store>, BackendError> {
        let mut tx = self.pool.begin().await?;
        let store = stores::disconnect_if_connected(store_id, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(store)
    }

    async fn insert_store_transfer(&self, transfer: NewStoreTransfer) -> Result<StoreTransfer, BackendError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_store_transfer(&transfer, Utc::now(), &mut conn).await
    }

    async fn fetch_transfers_for_payment(&self, payment_id: i64) -> Result<Vec<StoreTransfer>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let transfers = payments::fetch_transfers_for_payment(payment_id, &mut conn).await?;
        Ok(transfers)
    }

    async fn fetch_store_transfer(
        &self,
        payment_intent_id: &str,
        destination_account_id: &str,
    ) -> Result<Option<StoreTransfer>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let transfer = payments::fetch_store_transfer(payment_intent_id, destination_account_id, &mut conn).await?;
        Ok(transfer)
    }

    async fn settle_store_transfer(
        &self,
        settlement: TransferSettlement,
    ) -> Result<Option<StoreTransfer>, BackendError> {
        let mut tx = self.pool.begin().await?;
        let transfer = payments::settle_transfer_if(&settlement, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(transfer)
    }
}

impl ReviewManagement for SqliteDatabase {
    async fn fetch_review_context(&self, order_item_id: i64) -> Result<Option<ReviewContext>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let Some(item) = reviews::fetch_order_item(order_item_id, &mut conn).await? else {
            return Ok(None);
        };
        let sub_order = orders::fetch_sub_order(item.sub_order_id, &mut conn)
            .await?
            .ok_or(BackendError::SubOrderNotFound(item.sub_order_id))?;
        let order = orders::fetch_order(sub_order.order_id, &mut conn)
            .await?
            .ok_or_else(|| BackendError::DatabaseError(format!("Order {} is missing", sub_order.order_id)))?;
        let review = reviews::fetch_review_for_item(order_item_id, &mut conn).await?;
        Ok(Some(ReviewContext { item, sub_order, customer_id: order.customer_id, review }))
    }

    async fn insert_review(&self, customer_id: i64, review: NewReview) -> Result<Review, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let review = reviews::insert_review(customer_id, review, Utc::now(), &mut conn).await?;
        debug!("🗃️ Review #{} saved for order item #{}", review.id, review.order_item_id);
        Ok(review)
    }

    async fn fetch_review(&self, review_id: i64) -> Result<Option<ReviewWithStore>, BackendError> {
        let mut conn = self.pool.acquire().await?;
        let review = reviews::fetch_review_with_store(review_id, &mut conn).await?;
        Ok(review)
    }

    async fn set_seller_reply(&self, review_id: i64, reply: &str) -> Result<Review, BackendError> {
        let mut tx = self.pool.begin().await?;
        let review = reviews::set_reply_if_empty(review_id, reply, Utc::now(), &mut tx)
            .await?
            .ok_or(BackendError::ReviewAlreadyReplied(review_id))?;
        tx.commit().await?;
        Ok(review)
    }
}
