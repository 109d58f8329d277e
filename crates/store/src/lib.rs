//! Storage for carts and orders.
//!
//! Two stores share one database:
//! - [`CartStore`] owns carts and their line items and enforces the
//!   one-OPEN-cart-per-user invariant
//! - [`OrderStore`] owns immutable order records
//!
//! Every operation has a `*_in` form that joins a caller-supplied
//! transaction and an auto-committed form provided by the `*Ext` traits.

pub mod cart;
pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod tx;

pub use cart::{Cart, CartItem, CartStatus, CartStore, CartStoreExt};
pub use common::{CartId, Money, OrderId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCartStore, InMemoryDatabase, InMemoryOrderStore, MemoryTransaction};
pub use order::{NewOrder, Order, OrderPatch, OrderStatus, OrderStore, OrderStoreExt};
pub use postgres::{PgCartStore, PgOrderStore, PgTransaction, run_migrations};
pub use tx::Transactional;
