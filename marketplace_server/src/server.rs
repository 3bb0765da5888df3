use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use marketplace_engine::{
    events::{EventHandlers, EventHooks, EventProducers, PaymentReconciledEvent, SubOrderStatusChangedEvent},
    helpers::StripeEventVerifier,
    OrderStatusApi,
    ReviewApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        CreateReviewRoute,
        CustomerSubOrderRoute,
        CustomerUpdateStatusRoute,
        ReplyToReviewRoute,
        ReviewStatusRoute,
        StoreSubOrderRoute,
        StoreUpdateStatusRoute,
        StripeWebhookRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = if config.database_url.is_empty() {
        SqliteDatabase::new(config.max_connections).await
    } else {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    }
    .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_audit_log_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderStatusApi::new(db.clone(), producers.clone());
        let verifier = StripeEventVerifier::new(config.webhooks.signing_secret.clone())
            .with_tolerance(config.webhooks.signature_tolerance);
        let webhook_api = WebhookApi::new(db.clone(), verifier, producers.clone());
        let review_api = ReviewApi::new(db.clone(), config.review_window);
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(review_api));
        // Routes that require authentication
        let customer_scope = web::scope("/customer")
            .wrap(JwtMiddlewareFactory::new(validator.clone()))
            .service(ReviewStatusRoute::<SqliteDatabase>::new())
            .service(CustomerSubOrderRoute::<SqliteDatabase>::new())
            .service(CustomerUpdateStatusRoute::<SqliteDatabase>::new())
            .service(CreateReviewRoute::<SqliteDatabase>::new());
        let store_scope = web::scope("/store")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(StoreUpdateStatusRoute::<SqliteDatabase>::new())
            .service(StoreSubOrderRoute::<SqliteDatabase>::new())
            .service(ReplyToReviewRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(StripeWebhookRoute::<SqliteDatabase, StripeEventVerifier>::new())
            .service(customer_scope)
            .service(store_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Writes every committed status change and payment reconciliation to the `mkt::audit` log target.
pub fn create_audit_log_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(|ev: SubOrderStatusChangedEvent| {
        Box::pin(async move {
            let by = match ev.changed_by {
                Some((role, user_id)) => format!("{role} user #{user_id}"),
                None => "the payment gateway".to_string(),
            };
            info!(
                target: "mkt::audit",
                "📋️ {} moved from {} to {} by {by}",
                ev.sub_order,
                ev.old_status,
                ev.sub_order.status
            );
        })
    });
    hooks.on_payment_reconciled(|ev: PaymentReconciledEvent| {
        Box::pin(async move {
            info!(
                target: "mkt::audit",
                "📋️ Payment #{} for order #{} is now {}. {} sub-order(s) updated.",
                ev.payment.id,
                ev.payment.order_id,
                ev.payment.status,
                ev.sub_orders.len()
            );
        })
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}
