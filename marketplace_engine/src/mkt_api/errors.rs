use thiserror::Error;

use crate::{
    db_types::{ActorRole, SubOrderStatus},
    helpers::SignatureError,
    mkt_api::transitions::InvalidTransition,
    traits::BackendError,
};

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("A {role} cannot change a sub-order from {from} to {to}")]
    InvalidTransition { role: ActorRole, from: SubOrderStatus, to: SubOrderStatus },
    #[error("{0}")]
    BadRequest(String),
    #[error("Could not authenticate the request. {0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<InvalidTransition> for MarketplaceError {
    fn from(e: InvalidTransition) -> Self {
        let InvalidTransition { role, from, to } = e;
        Self::InvalidTransition { role, from, to }
    }
}

impl From<SignatureError> for MarketplaceError {
    fn from(e: SignatureError) -> Self {
        Self::Unauthenticated(e.to_string())
    }
}

impl From<BackendError> for MarketplaceError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::DatabaseError(s) => Self::DatabaseError(s),
            BackendError::SubOrderNotFound(id) => Self::NotFound(format!("Sub-order {id} does not exist")),
            BackendError::PaymentNotFound(id) => Self::NotFound(format!("No payment exists for intent {id}")),
            BackendError::StatusConflict(id) => {
                Self::Conflict(format!("Sub-order {id} was modified by someone else. Please try again."))
            },
            BackendError::TransferAlreadyExists { payment_id, store_id } => {
                Self::Conflict(format!("A transfer for payment {payment_id} to store {store_id} already exists"))
            },
            BackendError::ReviewAlreadyExists(item_id) => {
                Self::BadRequest(format!("Order item {item_id} has already been reviewed"))
            },
            BackendError::ReviewAlreadyReplied(review_id) => {
                Self::BadRequest(format!("Review {review_id} already has a reply"))
            },
        }
    }
}
