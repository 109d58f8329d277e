use common::{CartId, ErrorKind, OrderId, ProductId, UserId};
use thiserror::Error;

use crate::cart::CartStatus;

/// Errors that can occur when interacting with the cart and order stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cart does not exist.
    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// The line item does not exist in the cart.
    #[error("Item {product_id} not found in cart {cart_id}")]
    ItemNotFound {
        cart_id: CartId,
        product_id: ProductId,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The user already has an OPEN cart.
    #[error("User {0} already has an open cart")]
    OpenCartExists(UserId),

    /// The cart is frozen and can no longer be modified.
    #[error("Cart {cart_id} is {status}; only OPEN carts can be modified")]
    CartNotOpen { cart_id: CartId, status: CartStatus },

    /// An order already references this cart.
    #[error("An order already exists for cart {0}")]
    OrderExistsForCart(CartId),

    /// A line-item count or delta outside the accepted range.
    #[error("Invalid count {count}: {reason}")]
    InvalidCount { count: i64, reason: &'static str },

    /// An order field that is fixed at creation.
    #[error("Field '{0}' cannot be changed after the order is created")]
    ImmutableField(String),

    /// An order field that does not exist.
    #[error("Unknown order field '{0}'")]
    UnknownField(String),

    /// An order field with a value of the wrong shape.
    #[error("Invalid value for order field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// An order update without any fields.
    #[error("Order update contains no fields")]
    EmptyUpdate,

    /// The transaction could not commit or was rolled back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::CartNotFound(_)
            | StoreError::ItemNotFound { .. }
            | StoreError::OrderNotFound(_) => ErrorKind::NotFound,
            StoreError::OpenCartExists(_)
            | StoreError::CartNotOpen { .. }
            | StoreError::OrderExistsForCart(_) => ErrorKind::Conflict,
            StoreError::InvalidCount { .. }
            | StoreError::ImmutableField(_)
            | StoreError::UnknownField(_)
            | StoreError::InvalidField { .. }
            | StoreError::EmptyUpdate => ErrorKind::InvalidArgument,
            StoreError::TransactionFailed(_)
            | StoreError::InvalidRecord(_)
            | StoreError::Database(_)
            | StoreError::Migration(_) => ErrorKind::TransactionFailed,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
