//! In-memory catalog for testing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::ProductId;

use crate::{Catalog, CatalogError, Product};

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, Product>,
    unavailable: bool,
    lookups: usize,
}

/// Catalog holding products in a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&self, product: Product) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .products
            .insert(product.id, product);
    }

    /// Makes every lookup fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }

    /// Number of `fetch_products` calls served so far, failed ones included.
    pub fn lookup_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookups
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.lookups += 1;

        if state.unavailable {
            return Err(CatalogError::Unavailable("product service is down".into()));
        }

        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }
}
