use marketplace_engine::{
    db_types::{NewReview, SubOrderStatus},
    order_objects::StatusChangeRequest,
    WebhookOutcome,
};
use serde::{Deserialize, Serialize};

/// Request body for `PATCH /customer/orders/{subOrderId}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStatusUpdate {
    pub status: SubOrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<CustomerStatusUpdate> for StatusChangeRequest {
    fn from(value: CustomerStatusUpdate) -> Self {
        Self { status: Some(value.status), notes: value.notes, carrier: None, tracking_number: None }
    }
}

/// Request body for `PATCH /store/orders/{subOrderId}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatusUpdate {
    pub status: SubOrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl From<StoreStatusUpdate> for StatusChangeRequest {
    fn from(value: StoreStatusUpdate) -> Self {
        Self {
            status: Some(value.status),
            notes: value.notes,
            carrier: value.carrier,
            tracking_number: value.tracking_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReviewRequest {
    pub order_item_id: i64,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl From<NewReviewRequest> for NewReview {
    fn from(value: NewReviewRequest) -> Self {
        Self { order_item_id: value.order_item_id, rating: value.rating, comment: value.comment }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReplyRequest {
    pub reply: String,
}

/// The body returned to the gateway for every verified delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

impl WebhookAck {
    pub fn new(outcome: WebhookOutcome) -> Self {
        Self { received: true, outcome }
    }
}
