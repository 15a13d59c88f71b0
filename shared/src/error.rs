// ============================================================================
// Fulfillment Errors
// ============================================================================

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    #[error("quantity to remove must be greater than zero")]
    InvalidRemoveQuantity,

    #[error("invalid order status")]
    InvalidStatus(String),

    #[error("input has invalid price")]
    InvalidPrice,

    #[error("order not found")]
    OrderNotFound,

    #[error("input not found")]
    InputNotFound,

    #[error("order input not found")]
    OrderInputNotFound,

    #[error("insufficient input quantity")]
    InsufficientInputQuantity,

    #[error("insufficient quantity")]
    InsufficientQuantity,

    #[error("invalid quantity in order input")]
    InvalidOrderInputQuantity,

    #[error("insufficient quantity in order input")]
    InsufficientOrderInputQuantity,

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl FulfillmentError {
    pub fn kind(&self) -> ErrorKind {
        use FulfillmentError::*;

        match self {
            InvalidQuantity | InvalidRemoveQuantity | InvalidStatus(_) | InvalidPrice => {
                ErrorKind::Validation
            }
            OrderNotFound | InputNotFound | OrderInputNotFound => ErrorKind::NotFound,
            InsufficientInputQuantity
            | InsufficientQuantity
            | InvalidOrderInputQuantity
            | InsufficientOrderInputQuantity => ErrorKind::Conflict,
            Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn storage(message: impl std::fmt::Display) -> Self {
        FulfillmentError::Storage(anyhow::anyhow!("{}", message))
    }
}

impl From<diesel::result::Error> for FulfillmentError {
    fn from(e: diesel::result::Error) -> Self {
        FulfillmentError::Storage(e.into())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for FulfillmentError {
    fn from(e: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        FulfillmentError::storage(format!("failed to acquire connection: {}", e))
    }
}
