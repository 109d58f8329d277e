//! Service error types.

use catalog::CatalogError;
use common::{CartId, ErrorKind, OrderId, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors joining a cart with catalog data.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The catalog has no record for a product in the cart.
    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    /// The catalog could not be queried.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The priced total overflowed or exceeds what an order can hold.
    #[error("Total of cart {0} is out of range")]
    TotalOutOfRange(CartId),
}

impl EnrichmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProductNotFound(_) => ErrorKind::NotFound,
            Self::Catalog(e) => e.kind(),
            Self::TotalOutOfRange(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Errors surfaced by the cart, order and checkout services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The user has no OPEN cart.
    #[error("No active cart for user {0}")]
    NoOpenCart(UserId),

    /// Checkout was attempted on a cart without items.
    #[error("Cart {0} is empty")]
    EmptyCart(CartId),

    /// The order does not exist or belongs to another user.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// Enriching a cart for display failed.
    #[error("Could not populate cart: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Prices for a checkout could not be resolved.
    #[error("Could not price cart: {0}")]
    Pricing(#[source] EnrichmentError),

    /// The checkout transaction was rolled back.
    #[error("Checkout of cart {cart_id} failed: {source}")]
    TransactionFailed {
        cart_id: CartId,
        #[source]
        source: StoreError,
    },

    /// A store operation outside checkout failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoOpenCart(_) | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::EmptyCart(_) => ErrorKind::InvalidArgument,
            Self::Enrichment(e) => e.kind(),
            Self::Pricing(_) => ErrorKind::UpstreamUnavailable,
            Self::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Self::Store(e) => e.kind(),
        }
    }
}
