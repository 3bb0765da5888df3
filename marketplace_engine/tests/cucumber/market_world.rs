use std::collections::HashMap;

use cucumber::World;
use log::*;
use marketplace_engine::{
    db_types::{Store, SubOrder},
    helpers::StripeEventVerifier,
    order_objects::PlacedOrder,
    MarketplaceError,
    OrderStatusApi,
    ReviewApi,
    ReviewWindow,
    SqliteDatabase,
    WebhookApi,
    WebhookOutcome,
};
use mkt_common::Secret;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const WEBHOOK_SECRET: &str = "whsec_cucumber";

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketplaceSystem>,
    pub stores: HashMap<String, Store>,
    pub last_order: Option<PlacedOrder>,
    pub last_outcome: Option<WebhookOutcome>,
    pub last_error: Option<MarketplaceError>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderStatusApi<SqliteDatabase>,
    pub webhooks: WebhookApi<SqliteDatabase, StripeEventVerifier>,
    pub reviews: ReviewApi<SqliteDatabase>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn store(&self, name: &str) -> &Store {
        self.stores.get(name).unwrap_or_else(|| panic!("No store called {name}"))
    }

    /// The sub-order of the last order placed that belongs to the named store
    pub fn sub_order(&self, store_name: &str) -> &SubOrder {
        let store_id = self.store(store_name).id;
        let order = self.last_order.as_ref().expect("No order has been placed");
        order.sub_orders.iter().find(|s| s.store_id == store_id).expect("The order has no sub-order for this store")
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        db.migrate().await.expect("Error running DB migrations");
        debug!("Created database: {url}");
        let verifier = StripeEventVerifier::new(Secret::new(WEBHOOK_SECRET.to_string()));
        let orders = OrderStatusApi::new(db.clone(), Default::default());
        let webhooks = WebhookApi::new(db.clone(), verifier, Default::default());
        let reviews = ReviewApi::new(db.clone(), ReviewWindow::default());
        Self { db_path: url, db, orders, webhooks, reviews }
    }
}

pub async fn prepare_test_env() -> String {
    let path = format!("sqlite://{}/mkt_cucumber_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
    Sqlite::create_database(&path).await.expect("Error creating database");
    info!("Created Sqlite database {path}");
    path
}
