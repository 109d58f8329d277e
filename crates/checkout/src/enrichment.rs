//! Joining cart line items with catalog data.

use std::collections::HashMap;

use catalog::{Catalog, Product};
use chrono::{DateTime, Utc};
use common::{CartId, Money, UserId};
use serde::Serialize;
use store::{Cart, CartStatus};

use crate::EnrichmentError;

/// A line item with its catalog record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedItem {
    pub product: Product,
    pub count: u32,
}

impl PopulatedItem {
    /// Unit price times count, unrounded. `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.product.price.checked_times(self.count)
    }
}

/// A cart whose items carry current catalog prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedCart {
    pub id: CartId,
    pub user_id: UserId,
    pub status: CartStatus,
    pub items: Vec<PopulatedItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopulatedCart {
    /// Sum of line subtotals rounded half-up to two decimal places.
    ///
    /// Fails when the sum overflows or does not fit an order total.
    pub fn total(&self) -> Result<Money, EnrichmentError> {
        let sum = self
            .items
            .iter()
            .map(PopulatedItem::subtotal)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .map(|sum| sum.rounded())
            .filter(Money::fits_order_total);

        sum.ok_or_else(|| {
            tracing::warn!(cart_id = %self.id, "cart total out of range");
            EnrichmentError::TotalOutOfRange(self.id)
        })
    }

    fn from_parts(cart: &Cart, items: Vec<PopulatedItem>) -> Self {
        Self {
            id: cart.id,
            user_id: cart.user_id,
            status: cart.status,
            items,
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        }
    }
}

/// Prices every item of `cart` with one batch catalog lookup.
///
/// An empty cart is returned as-is without contacting the catalog. Fails
/// if any product is missing from the catalog response; a partially
/// priced cart is never returned.
#[tracing::instrument(skip(catalog, cart), fields(cart_id = %cart.id))]
pub async fn populate<K>(catalog: &K, cart: &Cart) -> Result<PopulatedCart, EnrichmentError>
where
    K: Catalog + ?Sized,
{
    if cart.is_empty() {
        return Ok(PopulatedCart::from_parts(cart, Vec::new()));
    }

    let products: HashMap<_, _> = catalog
        .fetch_products(&cart.product_ids())
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut items = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let Some(product) = products.get(&item.product_id) else {
            tracing::warn!(product_id = %item.product_id, "product details not found");
            return Err(EnrichmentError::ProductNotFound(item.product_id));
        };
        items.push(PopulatedItem {
            product: product.clone(),
            count: item.count,
        });
    }

    Ok(PopulatedCart::from_parts(cart, items))
}
