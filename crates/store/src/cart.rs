//! Carts, line items and the cart store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::tx::{Transactional, finish};
use crate::{Result, StoreError};

/// Lifecycle state of a cart.
///
/// ```text
/// OPEN ──checkout──► ORDERED
///   │
///   └──delete──► (gone)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    /// The user's single mutable cart.
    #[default]
    Open,

    /// Frozen by checkout (terminal state).
    Ordered,
}

impl CartStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Open => "OPEN",
            CartStatus::Ordered => "ORDERED",
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CartStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(CartStatus::Open),
            "ORDERED" => Ok(CartStatus::Ordered),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown cart status '{other}'"
            ))),
        }
    }
}

/// A `(productId, count)` pair within a cart. `count` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub count: u32,
}

impl CartItem {
    pub fn new(product_id: ProductId, count: u32) -> Self {
        Self { product_id, count }
    }
}

/// A cart with its line items, ordered by product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Returns true if the cart can still be modified.
    pub fn is_open(&self) -> bool {
        self.status == CartStatus::Open
    }

    /// Returns true if the cart has no line items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the line item for a product, if present.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Returns the distinct product ids in the cart.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }
}

/// Rejects a non-positive delta for [`CartStore::upsert_item_in`].
pub(crate) fn validate_delta(delta: i32) -> Result<()> {
    if delta <= 0 {
        return Err(StoreError::InvalidCount {
            count: i64::from(delta),
            reason: "delta must be greater than 0",
        });
    }
    Ok(())
}

/// Rejects a negative absolute count for [`CartStore::set_item_count_in`].
pub(crate) fn validate_count(count: i32) -> Result<()> {
    if count < 0 {
        return Err(StoreError::InvalidCount {
            count: i64::from(count),
            reason: "count must not be negative",
        });
    }
    Ok(())
}

pub(crate) fn count_overflow(delta: i32) -> StoreError {
    StoreError::InvalidCount {
        count: i64::from(delta),
        reason: "resulting count exceeds the supported maximum",
    }
}

/// Storage for carts and their line items.
///
/// Item mutations are rejected with `CartNotOpen` once a cart has been
/// ordered, and take the cart's row lock so they serialize with checkout.
#[async_trait]
pub trait CartStore: Transactional {
    /// Returns the user's OPEN cart with its items.
    async fn get_open_cart_in(&self, tx: &mut Self::Tx, user_id: UserId) -> Result<Option<Cart>>;

    /// Returns the user's OPEN cart and locks it until the transaction ends.
    ///
    /// A concurrent transaction that flips the cart out of OPEN before the
    /// lock is granted makes this return `None`.
    async fn lock_open_cart_in(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Cart>>;

    /// Returns a cart by id, whatever its status.
    async fn get_cart_in(&self, tx: &mut Self::Tx, cart_id: CartId) -> Result<Option<Cart>>;

    /// Creates an empty OPEN cart.
    ///
    /// Fails with `OpenCartExists` if the user already has one.
    async fn create_cart_in(&self, tx: &mut Self::Tx, user_id: UserId) -> Result<Cart>;

    /// Returns the user's OPEN cart, creating it if absent.
    ///
    /// Concurrent first-time calls for one user all observe the same cart.
    async fn get_or_create_open_cart_in(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Cart>;

    /// Adds `delta` to the product's count, inserting the line item if absent.
    async fn upsert_item_in(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<CartItem>;

    /// Sets the absolute count of an existing line item.
    ///
    /// A count of 0 removes the item and returns `None`.
    async fn set_item_count_in(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_id: ProductId,
        count: i32,
    ) -> Result<Option<CartItem>>;

    /// Deletes a line item.
    async fn remove_item_in(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<()>;

    /// Deletes an OPEN cart together with its items.
    async fn delete_cart_in(&self, tx: &mut Self::Tx, cart_id: CartId) -> Result<()>;

    /// Flips an OPEN cart to ORDERED.
    ///
    /// Guarded by the current status, so two racing calls cannot both
    /// succeed.
    async fn mark_ordered_in(&self, tx: &mut Self::Tx, cart_id: CartId) -> Result<()>;
}

/// Auto-committed forms of the [`CartStore`] operations.
#[async_trait]
pub trait CartStoreExt: CartStore {
    /// Returns the user's OPEN cart, or `None`.
    async fn get_open_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let mut tx = self.begin().await?;
        let result = self.get_open_cart_in(&mut tx, user_id).await;
        finish(self, tx, result).await
    }

    /// Returns a cart by id, or `None`.
    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        let mut tx = self.begin().await?;
        let result = self.get_cart_in(&mut tx, cart_id).await;
        finish(self, tx, result).await
    }

    /// Creates an empty OPEN cart for the user.
    async fn create_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut tx = self.begin().await?;
        let result = self.create_cart_in(&mut tx, user_id).await;
        finish(self, tx, result).await
    }

    /// Returns the user's OPEN cart, creating it if absent.
    async fn get_or_create_open_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut tx = self.begin().await?;
        let result = self.get_or_create_open_cart_in(&mut tx, user_id).await;
        finish(self, tx, result).await
    }

    /// Adds `delta` to a product's count.
    async fn upsert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<CartItem> {
        let mut tx = self.begin().await?;
        let result = self
            .upsert_item_in(&mut tx, cart_id, product_id, delta)
            .await;
        finish(self, tx, result).await
    }

    /// Sets a product's absolute count; 0 removes it.
    async fn set_item_count(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        count: i32,
    ) -> Result<Option<CartItem>> {
        let mut tx = self.begin().await?;
        let result = self
            .set_item_count_in(&mut tx, cart_id, product_id, count)
            .await;
        finish(self, tx, result).await
    }

    /// Deletes a line item.
    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> Result<()> {
        let mut tx = self.begin().await?;
        let result = self.remove_item_in(&mut tx, cart_id, product_id).await;
        finish(self, tx, result).await
    }

    /// Deletes an OPEN cart and its items.
    async fn delete_cart(&self, cart_id: CartId) -> Result<()> {
        let mut tx = self.begin().await?;
        let result = self.delete_cart_in(&mut tx, cart_id).await;
        finish(self, tx, result).await
    }
}

// Blanket implementation for all CartStore implementations
impl<T: CartStore + ?Sized> CartStoreExt for T {}
