use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use marketplace_engine::{
    db_types::{Money, Payment, PaymentStatus, SubOrderStatus},
    events::EventProducers,
    helpers::{sign_payload, StripeEventVerifier},
    traits::{AppliedPayment, BackendError},
    WebhookApi,
};
use mkt_common::Secret;

use super::{
    helpers::{sample_sub_order, send_request, timestamp},
    mocks::MockReconciler,
};
use crate::routes::{StripeWebhookRoute, STRIPE_SIGNATURE_HEADER};

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests_only";
const SUCCEEDED: &str =
    r#"{"id":"evt_100","type":"payment_intent.succeeded","created":1772366400,"data":{"object":{"id":"pi_100"}}}"#;

#[actix_web::test]
async fn verified_payments_are_applied() {
    let _ = env_logger::try_init().ok();
    let (status, body) = deliver(SUCCEEDED, Some(&sign(SUCCEEDED)), pending_payment).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true,"outcome":"Applied"}"#);
}

#[actix_web::test]
async fn replayed_payments_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let (status, body) = deliver(SUCCEEDED, Some(&sign(SUCCEEDED)), paid_payment).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true,"outcome":"AlreadyApplied"}"#);
}

#[actix_web::test]
async fn payments_we_do_not_know_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let (status, body) = deliver(SUCCEEDED, Some(&sign(SUCCEEDED)), unknown_payment).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true,"outcome":"EntityNotFound"}"#);
}

#[actix_web::test]
async fn uninteresting_events_are_ignored() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"id":"evt_101","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
    let (status, body) = deliver(payload, Some(&sign(payload)), untouched_reconciler).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true,"outcome":"Ignored"}"#);
}

#[actix_web::test]
async fn unsigned_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = deliver(SUCCEEDED, None, untouched_reconciler).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No signature header was provided"), "{body}");
}

#[actix_web::test]
async fn forged_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let now = Utc::now().timestamp();
    let forged = sign_payload("whsec_someone_else", now, SUCCEEDED.as_bytes()).unwrap();
    let (status, body) = deliver(SUCCEEDED, Some(&forged), untouched_reconciler).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No signature in the header matches the payload"), "{body}");
}

#[actix_web::test]
async fn tampered_payloads_are_rejected() {
    let _ = env_logger::try_init().ok();
    let tampered = SUCCEEDED.replace("pi_100", "pi_999");
    let (status, _) = deliver(&tampered, Some(&sign(SUCCEEDED)), untouched_reconciler).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn stale_signatures_are_rejected() {
    let _ = env_logger::try_init().ok();
    let an_hour_ago = Utc::now().timestamp() - 3600;
    let stale = sign_payload(WEBHOOK_SECRET, an_hour_ago, SUCCEEDED.as_bytes()).unwrap();
    let (status, body) = deliver(SUCCEEDED, Some(&stale), untouched_reconciler).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("outside the tolerance window"), "{body}");
}

#[actix_web::test]
async fn storage_failures_ask_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let (status, _) = deliver(SUCCEEDED, Some(&sign(SUCCEEDED)), broken_reconciler).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

//---------------------------------------------   Helpers   -----------------------------------------------------------
fn sign(payload: &str) -> String {
    sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.as_bytes()).unwrap()
}

async fn deliver(payload: &str, signature: Option<&str>, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri("/webhooks/stripe").set_payload(payload.to_string());
    if let Some(sig) = signature {
        req = req.insert_header((STRIPE_SIGNATURE_HEADER, sig.to_string()));
    }
    send_request(req, "", configure).await.expect("Webhook routes have no middleware")
}

fn payment(status: PaymentStatus) -> Payment {
    Payment {
        id: 5,
        order_id: 3,
        payment_intent_id: "pi_100".to_string(),
        status,
        amount: Money::from(4500),
        currency: "usd".to_string(),
        total_commission: Money::from(450),
        paid_at: None,
        failure_message: None,
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

//---------------------------------------------   Configurations   ----------------------------------------------------
fn configure_with(cfg: &mut ServiceConfig, backend: MockReconciler) {
    let verifier = StripeEventVerifier::new(Secret::from(WEBHOOK_SECRET));
    let api = WebhookApi::new(backend, verifier, EventProducers::default());
    cfg.service(StripeWebhookRoute::<MockReconciler, StripeEventVerifier>::new()).app_data(web::Data::new(api));
}

/// A reconciler that panics if it is called at all
fn untouched_reconciler(cfg: &mut ServiceConfig) {
    configure_with(cfg, MockReconciler::new());
}

fn pending_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockReconciler::new();
    backend.expect_fetch_payment_by_intent_id().returning(|_| Ok(Some(payment(PaymentStatus::Pending))));
    backend
        .expect_apply_payment_outcome()
        .times(1)
        .withf(|o| {
            o.payment_id == 5 &&
                o.expected_status == PaymentStatus::Pending &&
                o.new_status == PaymentStatus::Succeeded &&
                o.sub_order_status == SubOrderStatus::Confirmed &&
                o.create_transfers
        })
        .returning(|_| {
            let mut paid = payment(PaymentStatus::Succeeded);
            paid.paid_at = Some(timestamp());
            let sub_orders = vec![sample_sub_order(SubOrderStatus::Confirmed)];
            Ok(Some(AppliedPayment { payment: paid, sub_orders, transfers: vec![] }))
        });
    configure_with(cfg, backend);
}

fn paid_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockReconciler::new();
    backend.expect_fetch_payment_by_intent_id().returning(|_| Ok(Some(payment(PaymentStatus::Succeeded))));
    backend.expect_apply_payment_outcome().never();
    configure_with(cfg, backend);
}

fn unknown_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockReconciler::new();
    backend.expect_fetch_payment_by_intent_id().returning(|_| Ok(None));
    configure_with(cfg, backend);
}

fn broken_reconciler(cfg: &mut ServiceConfig) {
    let mut backend = MockReconciler::new();
    backend
        .expect_fetch_payment_by_intent_id()
        .returning(|_| Err(BackendError::DatabaseError("database is locked".into())));
    configure_with(cfg, backend);
}
