use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use marketplace_engine::{
    db_types::{ActorRole, Review, SubOrderStatus},
    order_objects::{ReviewStatus, SubOrderDetails},
    traits::{ReviewContext, ReviewWithStore},
    ReviewApi,
    ReviewWindow,
};
use serde_json::json;

use super::{helpers::*, mocks::MockMarketBackend};
use crate::routes::{CreateReviewRoute, ReplyToReviewRoute, ReviewStatusRoute};

#[actix_web::test]
async fn recently_completed_orders_can_be_reviewed() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(&customer_token(), "/customer/orders/sub-order/7/status", completed_two_days_ago)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let review_status: ReviewStatus = serde_json::from_str(&body).unwrap();
    assert!(review_status.is_within_window);
    assert!(review_status.can_leave_review);
    assert_eq!(review_status.days_remaining, 5);
    assert_eq!(review_status.items.len(), 1);
    assert_eq!(review_status.items[0].order_item_id, 70);
    assert!(!review_status.items[0].reviewed);
}

#[actix_web::test]
async fn the_window_closes_after_a_week() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(&customer_token(), "/customer/orders/sub-order/7/status", completed_last_month)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let review_status: ReviewStatus = serde_json::from_str(&body).unwrap();
    assert!(!review_status.is_within_window);
    assert!(!review_status.can_leave_review);
    assert_eq!(review_status.days_remaining, 0);
}

#[actix_web::test]
async fn unfinished_orders_have_no_review_status() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(&customer_token(), "/customer/orders/sub-order/7/status", still_shipping).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Only completed orders can be reviewed"), "{body}");
}

#[actix_web::test]
async fn review_status_is_private() {
    let _ = env_logger::try_init().ok();
    let token = bearer(OTHER_CUSTOMER_ID, vec![ActorRole::Customer]);
    let (status, _) =
        get_request(&token, "/customer/orders/sub-order/7/status", completed_two_days_ago).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn customer_reviews_an_item() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "orderItemId": 70, "rating": 4, "comment": "  Lovely patina  " });
    let (status, body) = post_request(&customer_token(), "/customer/reviews", body, reviewable_item)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let review: Review = serde_json::from_str(&body).unwrap();
    assert_eq!(review.rating, 4);
    assert_eq!(review.comment.as_deref(), Some("Lovely patina"));
}

#[actix_web::test]
async fn ratings_must_be_between_one_and_five() {
    let _ = env_logger::try_init().ok();
    for rating in [0, 6] {
        let body = json!({ "orderItemId": 70, "rating": rating });
        let (status, body) =
            post_request(&customer_token(), "/customer/reviews", body, reviewable_item).await.expect("Request failed");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Ratings must be between 1 and 5"}"#);
    }
}

#[actix_web::test]
async fn stores_cannot_write_reviews() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "orderItemId": 70, "rating": 5 });
    let err = post_request(&store_token(), "/customer/reviews", body, untouched_backend)
        .await
        .expect_err("Request should have failed");
    assert!(err.starts_with("Authentication Error. Insufficient Permissions."), "{err}");
}

#[actix_web::test]
async fn store_replies_to_a_review() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "reply": "Thank you!" });
    let (status, body) =
        post_request(&store_token(), "/store/reviews/700/reply", body, review_of_our_store).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let review: Review = serde_json::from_str(&body).unwrap();
    assert_eq!(review.seller_reply.as_deref(), Some("Thank you!"));
}

#[actix_web::test]
async fn stores_only_reply_to_their_own_reviews() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "reply": "Thank you!" });
    let (status, body) = post_request(&store_token(), "/store/reviews/700/reply", body, review_of_another_store)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Review 700 is not about your store"), "{body}");
}

//---------------------------------------------   Sample data   -------------------------------------------------------
fn completed_details(days_ago: i64) -> SubOrderDetails {
    let mut details = sample_details(SubOrderStatus::Completed);
    details.sub_order.completed_at = Some(Utc::now() - Duration::days(days_ago));
    details
}

fn review(seller_reply: Option<&str>) -> Review {
    Review {
        id: 700,
        order_item_id: 70,
        customer_id: CUSTOMER_ID,
        rating: 4,
        comment: Some("Lovely patina".to_string()),
        seller_reply: seller_reply.map(String::from),
        replied_at: seller_reply.map(|_| timestamp()),
        created_at: timestamp(),
    }
}

//---------------------------------------------   Configurations   ----------------------------------------------------
fn configure_with(cfg: &mut ServiceConfig, backend: MockMarketBackend) {
    let api = ReviewApi::new(backend, ReviewWindow::days(7));
    cfg.service(
        web::scope("/customer")
            .wrap(jwt_middleware())
            .service(ReviewStatusRoute::<MockMarketBackend>::new())
            .service(CreateReviewRoute::<MockMarketBackend>::new()),
    )
    .service(web::scope("/store").wrap(jwt_middleware()).service(ReplyToReviewRoute::<MockMarketBackend>::new()))
    .app_data(web::Data::new(api));
}

fn untouched_backend(cfg: &mut ServiceConfig) {
    configure_with(cfg, MockMarketBackend::new());
}

fn completed_two_days_ago(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Ok(Some(completed_details(2))));
    configure_with(cfg, backend);
}

fn completed_last_month(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Ok(Some(completed_details(30))));
    configure_with(cfg, backend);
}

fn still_shipping(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_sub_order_details().returning(|_| Ok(Some(sample_details(SubOrderStatus::Shipped))));
    configure_with(cfg, backend);
}

fn reviewable_item(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_review_context().returning(|_| {
        let details = completed_details(1);
        let item = details.items[0].item.clone();
        Ok(Some(ReviewContext { item, sub_order: details.sub_order, customer_id: CUSTOMER_ID, review: None }))
    });
    backend.expect_insert_review().returning(|customer_id, new_review| {
        Ok(Review {
            customer_id,
            rating: new_review.rating,
            comment: new_review.comment,
            order_item_id: new_review.order_item_id,
            ..review(None)
        })
    });
    configure_with(cfg, backend);
}

fn review_of_our_store(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_store_for_owner().returning(|_| Ok(Some(sample_store())));
    backend.expect_fetch_review().returning(|_| Ok(Some(ReviewWithStore { review: review(None), store_id: STORE_ID })));
    backend.expect_set_seller_reply().times(1).returning(|_, reply| Ok(review(Some(reply))));
    configure_with(cfg, backend);
}

fn review_of_another_store(cfg: &mut ServiceConfig) {
    let mut backend = MockMarketBackend::new();
    backend.expect_fetch_store_for_owner().returning(|_| Ok(Some(sample_store())));
    backend.expect_fetch_review().returning(|_| Ok(Some(ReviewWithStore { review: review(None), store_id: 99 })));
    backend.expect_set_seller_reply().never();
    configure_with(cfg, backend);
}
