use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, ProductId, UserId};

use super::{CartRecord, InMemoryDatabase, MemoryTransaction};
use crate::cart::{count_overflow, validate_count, validate_delta};
use crate::tx::Transactional;
use crate::{Cart, CartItem, CartStatus, CartStore, Result, StoreError};

/// In-memory cart store implementation for testing.
///
/// Provides the same interface and invariants as the PostgreSQL store; the
/// one-OPEN-cart rule is checked under the database lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    db: InMemoryDatabase,
}

impl InMemoryCartStore {
    /// Creates a cart store on the given database.
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &InMemoryDatabase {
        &self.db
    }
}

#[async_trait]
impl Transactional for InMemoryCartStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        Ok(self.db.begin().await)
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<()> {
        self.db.commit(tx)
    }

    async fn rollback(&self, tx: MemoryTransaction) -> Result<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_open_cart_in(
        &self,
        tx: &mut MemoryTransaction,
        user_id: UserId,
    ) -> Result<Option<Cart>> {
        Ok(tx.staged.open_cart(user_id).map(CartRecord::to_cart))
    }

    async fn lock_open_cart_in(
        &self,
        tx: &mut MemoryTransaction,
        user_id: UserId,
    ) -> Result<Option<Cart>> {
        // The transaction already holds the database lock.
        self.get_open_cart_in(tx, user_id).await
    }

    async fn get_cart_in(
        &self,
        tx: &mut MemoryTransaction,
        cart_id: CartId,
    ) -> Result<Option<Cart>> {
        Ok(tx.staged.carts.get(&cart_id).map(CartRecord::to_cart))
    }

    async fn create_cart_in(&self, tx: &mut MemoryTransaction, user_id: UserId) -> Result<Cart> {
        if tx.staged.open_cart(user_id).is_some() {
            return Err(StoreError::OpenCartExists(user_id));
        }

        let now = Utc::now();
        let record = CartRecord {
            id: CartId::new(),
            user_id,
            status: CartStatus::Open,
            items: Default::default(),
            created_at: now,
            updated_at: now,
        };
        let cart = record.to_cart();
        tx.staged.carts.insert(record.id, record);

        metrics::counter!("carts_created_total").increment(1);
        tracing::info!(cart_id = %cart.id, %user_id, "cart created");
        Ok(cart)
    }

    async fn get_or_create_open_cart_in(
        &self,
        tx: &mut MemoryTransaction,
        user_id: UserId,
    ) -> Result<Cart> {
        match tx.staged.open_cart(user_id) {
            Some(cart) => Ok(cart.to_cart()),
            None => self.create_cart_in(tx, user_id).await,
        }
    }

    async fn upsert_item_in(
        &self,
        tx: &mut MemoryTransaction,
        cart_id: CartId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<CartItem> {
        validate_delta(delta)?;
        let cart = tx.staged.open_cart_mut(cart_id)?;

        let current = cart.items.get(&product_id).copied().unwrap_or(0);
        let count = i32::try_from(current)
            .ok()
            .and_then(|c| c.checked_add(delta))
            .ok_or_else(|| count_overflow(delta))?;
        let count = count.unsigned_abs();

        cart.items.insert(product_id, count);
        cart.updated_at = Utc::now();

        metrics::counter!("cart_item_mutations_total", "op" => "upsert").increment(1);
        Ok(CartItem::new(product_id, count))
    }

    async fn set_item_count_in(
        &self,
        tx: &mut MemoryTransaction,
        cart_id: CartId,
        product_id: ProductId,
        count: i32,
    ) -> Result<Option<CartItem>> {
        validate_count(count)?;
        let cart = tx.staged.open_cart_mut(cart_id)?;
        cart.updated_at = Utc::now();

        if count == 0 {
            cart.items.remove(&product_id);
            metrics::counter!("cart_item_mutations_total", "op" => "set").increment(1);
            return Ok(None);
        }

        let Some(existing) = cart.items.get_mut(&product_id) else {
            return Err(StoreError::ItemNotFound {
                cart_id,
                product_id,
            });
        };
        *existing = count.unsigned_abs();
        metrics::counter!("cart_item_mutations_total", "op" => "set").increment(1);
        Ok(Some(CartItem::new(product_id, *existing)))
    }

    async fn remove_item_in(
        &self,
        tx: &mut MemoryTransaction,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<()> {
        let cart = tx.staged.open_cart_mut(cart_id)?;
        if cart.items.remove(&product_id).is_none() {
            return Err(StoreError::ItemNotFound {
                cart_id,
                product_id,
            });
        }
        cart.updated_at = Utc::now();
        metrics::counter!("cart_item_mutations_total", "op" => "remove").increment(1);
        Ok(())
    }

    async fn delete_cart_in(&self, tx: &mut MemoryTransaction, cart_id: CartId) -> Result<()> {
        tx.staged.open_cart_mut(cart_id)?;
        tx.staged.carts.remove(&cart_id);
        tracing::info!(%cart_id, "cart deleted");
        Ok(())
    }

    async fn mark_ordered_in(&self, tx: &mut MemoryTransaction, cart_id: CartId) -> Result<()> {
        if self.db.take_status_update_fault() {
            return Err(StoreError::TransactionFailed(format!(
                "injected failure updating status of cart {cart_id}"
            )));
        }
        let cart = tx.staged.open_cart_mut(cart_id)?;
        cart.status = CartStatus::Ordered;
        cart.updated_at = Utc::now();
        Ok(())
    }
}
