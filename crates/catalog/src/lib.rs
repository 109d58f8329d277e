//! Product catalog lookups.
//!
//! The cart only stores product ids and counts; titles, descriptions and
//! prices are owned by the external product service and fetched through
//! the [`Catalog`] trait.

pub mod error;
pub mod http;
pub mod memory;
pub mod product;

use async_trait::async_trait;
use common::ProductId;

pub use error::CatalogError;
pub use http::HttpCatalog;
pub use memory::InMemoryCatalog;
pub use product::Product;

/// Batch product lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the products with the given ids in one call.
    ///
    /// Ids unknown to the catalog are simply absent from the result.
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError>;
}
