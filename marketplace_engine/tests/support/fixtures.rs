use chrono::{DateTime, Utc};
use marketplace_engine::{
    db_types::{Money, NewOrder, NewOrderItem, NewStore, Store, SubOrderStatus},
    events::EventProducers,
    helpers::sign_payload,
    order_objects::PlacedOrder,
    traits::OrderManagement,
    OrderStatusApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

pub const WEBHOOK_SECRET: &str = "whsec_marketplace_test";
pub const CUSTOMER_ID: i64 = 1;
pub const OTHER_CUSTOMER_ID: i64 = 2;
pub const ALICE_USER_ID: i64 = 100;
pub const BOB_USER_ID: i64 = 200;
pub const ALICE_ACCOUNT: &str = "acct_alice";
pub const BOB_ACCOUNT: &str = "acct_bob";
pub const PAYMENT_INTENT: &str = "pi_test_1001";

pub struct Marketplace {
    pub alice: Store,
    pub bob: Store,
    pub placed: PlacedOrder,
}

impl Marketplace {
    /// The id of the sub-order that belongs to Alice's store
    pub fn alice_sub_order(&self) -> i64 {
        self.sub_order_for(self.alice.id)
    }

    pub fn bob_sub_order(&self) -> i64 {
        self.sub_order_for(self.bob.id)
    }

    fn sub_order_for(&self, store_id: i64) -> i64 {
        self.placed.sub_orders.iter().find(|s| s.store_id == store_id).map(|s| s.id).expect("No sub-order for store")
    }
}

/// Two stores, and one order from [`CUSTOMER_ID`] that buys from both of them.
pub async fn seed_marketplace(db: &SqliteDatabase) -> Marketplace {
    let alice = db
        .insert_store(NewStore::new(ALICE_USER_ID, "Alice's Antiques", 1000).with_payout_account(ALICE_ACCOUNT))
        .await
        .expect("Error creating Alice's store");
    let bob = db
        .insert_store(NewStore::new(BOB_USER_ID, "Bob's Books", 1250).with_payout_account(BOB_ACCOUNT))
        .await
        .expect("Error creating Bob's store");
    let order = NewOrder::new(CUSTOMER_ID, PAYMENT_INTENT)
        .with_sub_order(alice.id, vec![
            NewOrderItem::new("Brass lamp", 1, Money::from(4500)),
            NewOrderItem::new("Tea set", 2, Money::from(2750)),
        ])
        .with_sub_order(bob.id, vec![NewOrderItem::new("Atlas", 1, Money::from(10050))]);
    let api = OrderStatusApi::new(db.clone(), EventProducers::default());
    let placed = api.place_order(order).await.expect("Error placing order");
    Marketplace { alice, bob, placed }
}

/// Puts a sub-order straight into `status`, bypassing the transition rules. `completed_at` is only kept for
/// `Completed`.
pub async fn force_status(
    db: &SqliteDatabase,
    sub_order_id: i64,
    status: SubOrderStatus,
    completed_at: Option<DateTime<Utc>>,
) {
    let completed_at = if status == SubOrderStatus::Completed { completed_at.or(Some(Utc::now())) } else { None };
    sqlx::query("UPDATE sub_orders SET status = $1, completed_at = $2 WHERE id = $3")
        .bind(status)
        .bind(completed_at)
        .bind(sub_order_id)
        .execute(db.pool())
        .await
        .expect("Error forcing sub-order status");
}

pub async fn history_len(db: &SqliteDatabase, sub_order_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM order_status_history WHERE sub_order_id = $1")
        .bind(sub_order_id)
        .fetch_one(db.pool())
        .await
        .expect("Error counting history")
}

pub fn gateway_event(id: &str, event_type: &str, object: Value) -> Vec<u8> {
    let event = json!({
        "id": id,
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    });
    serde_json::to_vec(&event).expect("Error serializing event")
}

pub fn account_event(id: &str, event_type: &str, account: &str, object: Value) -> Vec<u8> {
    let event = json!({
        "id": id,
        "type": event_type,
        "account": account,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    });
    serde_json::to_vec(&event).expect("Error serializing event")
}

pub fn sign(payload: &[u8]) -> String {
    sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload).expect("Error signing payload")
}
