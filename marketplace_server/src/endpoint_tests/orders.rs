use std::sync::{Arc, Mutex};

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use marketplace_engine::{
    db_types::{ActorRole, SubOrderStatus},
    events::EventProducers,
    order_objects::SubOrderDetails,
    traits::{BackendError, StatusChange},
    OrderStatusApi,
};
use serde_json::json;

use super::{helpers::*, mocks::MockMarketBackend};
use crate::routes::{CustomerSubOrderRoute, CustomerUpdateStatusRoute, StoreSubOrderRoute, StoreUpdateStatusRoute};

#[actix_web::test]
async fn customer_routes_require_a_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/customer/orders/sub-order/7", untouched_backend).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. No bearer token was provided.");
}

#[actix_web::test]
async fn store_tokens_cannot_use_customer_routes() {
    let _ = env_logger::try_init().ok();
    let err = get_request(&store_token(), "/customer/orders/sub-order/7", untouched_backend)
        .await
        .expect_err("Request should have failed");
    assert!(err.starts_with("Authentication Error. Insufficient Permissions."), "{err}");
}

#[actix_web::test]
async fn customer_fetches_their_sub_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(&customer_token(), "/customer/orders/sub-order/7", shipped_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let details: SubOrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details, sample_details(SubOrderStatus::Shipped));
}

#[actix_web::test]
async fn customer_confirms_receipt() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "status": "Completed", "notes": "Arrived safely" });
    let (status, body) =
        patch_request(&customer_token(), "/customer/orders/7/status", body, shipped_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let details: SubOrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.status(), SubOrderStatus::Completed);
    assert!(details.sub_order.completed_at.is_some());
}

#[actix_web::test]
async fn customer_cannot_skip_ahead() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "status": "Completed" });
    let (status, body) = patch_request(&customer_token(), "/customer/orders/7/status", body, processing_order)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"A customer cannot change a sub-order from Processing to Completed"}"#);
}

#[actix_web::test]
async fn customers_cannot_touch_other_peoples_orders() {
    let _ = env_logger::try_init().ok();
    let token = bearer(OTHER_CUSTOMER_ID, vec![ActorRole::Customer]);
    let body = json!({ "status": "Cancelled" });
    let (status, _) =
        patch_request(&token, "/customer/orders/7/status", body, processing_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn missing_sub_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(&customer_token(), "/customer/orders/sub-order/7", empty_backend).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Sub-order 7 does not exist"}"#);
}

#[actix_web::test]
async fn concurrent_changes_conflict() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "status": "Completed" });
    let (status, _) =
        patch_request(&customer_token(), "/customer/orders/7/status", body, racing_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn database_failures_are_server_errors() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        get_request(&customer_token(), "/customer/orders/sub-order/7", broken_backend).await.expect("Request failed");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn store_ships_with_tracking_details() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "status": "Shipped", "carrier": "DHL", "trackingNumber": "JD014600006281230004" });
    let (status, body) =
        patch_request(&store_token(), "/store/orders/7/status", body, delivering_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let details: SubOrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.status(), SubOrderStatus::Shipped);
    assert_eq!(details.sub_order.carrier.as_deref(), Some("DHL"));
}

#[actix_web::test]
async fn users_without_a_store_are_forbidden() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(&store_token(), "/store/orders/7", empty_backend).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Authentication Error. You do not own a store."}"#);
}

#[actix_web::test]
async fn stores_cannot_see_unpaid_orders() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request(&store_token(), "/store/orders/7", pending_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn stores_cannot_set_gateway_statuses() {
    let _ = env_logger::try_init().ok();
    for target in ["Refunded", "Failed", "Completed", "Pending"] {
        let body = json!({ "status": target });
        let (status, _) = patch_request(&store_token(), "/store/orders/7/status", body, processing_order)
            .await
            .expect("Request failed");
        assert_eq!(status, StatusCode::BAD_REQUEST, "A store moved a sub-order to {target}");
    }
}

#[actix_web::test]
async fn unknown_statuses_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "status": "Teleported" });
    let (status, _) =
        patch_request(&store_token(), "/store/orders/7/status", body, untouched_backend).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

//---------------------------------------------   Configurations   ----------------------------------------------------
fn configure_with(cfg: &mut ServiceConfig, backend: MockMarketBackend) {
    let api = OrderStatusApi::new(backend, EventProducers::default());
    cfg.service(
        web::scope("/customer")
            .wrap(jwt_middleware())
            .service(CustomerSubOrderRoute::<MockMarketBackend>::new())
            .service(CustomerUpdateStatusRoute::<MockMarketBackend>::new()),
    )
    .service(
        web::scope("/store")
            .wrap(jwt_middleware())
            .service(StoreSubOrderRoute::<MockMarketBackend>::new())
            .service(StoreUpdateStatusRoute::<MockMarketBackend>::new()),
    )
    .app_data(web::Data::new(api));
}

/// A backend that panics if it is called at all
fn untouched_backend(cfg: &mut ServiceConfig) {
    configure_with(cfg, MockMarketBackend::new());
}

fn empty_backend(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Ok(None));
    backend.expect_fetch_store_for_owner().returning(|_| Ok(None));
    configure_with(cfg, backend);
}

fn broken_backend(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Err(BackendError::DatabaseError("disk I/O error".into())));
    configure_with(cfg, backend);
}

/// A backend whose sub-order is in `from`, and which accepts one move to `to`. The sub-order belongs to
/// [`CUSTOMER_ID`] and to the store owned by [`STORE_OWNER_ID`].
fn moving_order(cfg: &mut ServiceConfig, from: SubOrderStatus, to: SubOrderStatus) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_store_for_owner().withf(|id| *id == STORE_OWNER_ID).returning(|_| Ok(Some(sample_store())));
    let applied = Arc::new(Mutex::new(None::<StatusChange>));
    let recorder = Arc::clone(&applied);
    backend.expect_apply_status_change().times(0..=1).withf(move |c| c.from == from && c.to == to).returning(
        move |change| {
            let mut sub_order = sample_sub_order(change.to);
            sub_order.carrier = change.carrier.clone();
            sub_order.tracking_number = change.tracking_number.clone();
            *recorder.lock().unwrap() = Some(change);
            Ok(sub_order)
        },
    );
    backend.expect_fetch_sub_order_details().returning(move |_| {
        let details = match applied.lock().unwrap().as_ref() {
            Some(change) => {
                let mut details = sample_details(change.to);
                details.sub_order.carrier = change.carrier.clone();
                details.sub_order.tracking_number = change.tracking_number.clone();
                details
            },
            None => sample_details(from),
        };
        Ok(Some(details))
    });
    configure_with(cfg, backend);
}

fn pending_order(cfg: &mut ServiceConfig) {
    moving_order(cfg, SubOrderStatus::Pending, SubOrderStatus::Confirmed);
}

fn processing_order(cfg: &mut ServiceConfig) {
    moving_order(cfg, SubOrderStatus::Processing, SubOrderStatus::Delivering);
}

fn delivering_order(cfg: &mut ServiceConfig) {
    moving_order(cfg, SubOrderStatus::Delivering, SubOrderStatus::Shipped);
}

fn shipped_order(cfg: &mut ServiceConfig) {
    moving_order(cfg, SubOrderStatus::Shipped, SubOrderStatus::Completed);
}

fn racing_order(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Ok(Some(sample_details(SubOrderStatus::Shipped))));
    backend.expect_apply_status_change().times(1).returning(|c| Err(BackendError::StatusConflict(c.sub_order_id)));
    configure_with(cfg, backend);
}
