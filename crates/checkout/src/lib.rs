//! Cart pricing and checkout.
//!
//! [`CartService`] drives cart mutations for a user, [`populate`] joins a
//! cart with catalog prices and [`CheckoutService`] converts the user's
//! OPEN cart into an order in a single transaction.

pub mod cart;
pub mod enrichment;
pub mod error;
pub mod order;
pub mod service;

pub use cart::CartService;
pub use enrichment::{PopulatedCart, PopulatedItem, populate};
pub use error::{EnrichmentError, ServiceError};
pub use order::OrderService;
pub use service::{CheckoutRequest, CheckoutService};
