use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested sub-order (internal id {0}) does not exist")]
    SubOrderNotFound(i64),
    #[error("No payment exists for payment intent {0}")]
    PaymentNotFound(String),
    #[error("Sub-order {0} changed status while the update was in flight")]
    StatusConflict(i64),
    #[error("A transfer for payment {payment_id} to store {store_id} already exists")]
    TransferAlreadyExists { payment_id: i64, store_id: i64 },
    #[error("Order item {0} has already been reviewed")]
    ReviewAlreadyExists(i64),
    #[error("Review {0} already has a seller reply")]
    ReviewAlreadyReplied(i64),
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        BackendError::DatabaseError(e.to_string())
    }
}
