//! Shared types for the cart and order core.
//!
//! - Typed UUID identifiers for users, carts, orders and products
//! - [`Money`], a fixed-point amount with two decimal places
//! - [`ErrorKind`], the error taxonomy every crate maps its errors onto

pub mod error;
pub mod money;
pub mod types;

pub use error::ErrorKind;
pub use money::Money;
pub use types::{CartId, OrderId, ProductId, UserId};
