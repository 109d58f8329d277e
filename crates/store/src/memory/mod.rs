//! In-memory stores for tests and local runs.
//!
//! Both stores share one [`InMemoryDatabase`]. A transaction holds the
//! database lock for its whole lifetime and works on a staged copy of the
//! tables, so writers are serialized and a rollback simply drops the copy.

mod cart;
mod order;

pub use cart::InMemoryCartStore;
pub use order::InMemoryOrderStore;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{Cart, CartItem, CartStatus, Order, Result, StoreError};

#[derive(Debug, Clone)]
pub(crate) struct CartRecord {
    pub id: CartId,
    pub user_id: UserId,
    pub status: CartStatus,
    pub items: BTreeMap<ProductId, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartRecord {
    pub fn to_cart(&self) -> Cart {
        Cart {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            items: self
                .items
                .iter()
                .map(|(product_id, count)| CartItem::new(*product_id, *count))
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub carts: HashMap<CartId, CartRecord>,
    pub orders: HashMap<OrderId, Order>,
}

impl Tables {
    pub fn open_cart(&self, user_id: UserId) -> Option<&CartRecord> {
        self.carts
            .values()
            .find(|cart| cart.user_id == user_id && cart.status == CartStatus::Open)
    }

    /// Returns an OPEN cart for mutation, or why it cannot be mutated.
    pub fn open_cart_mut(&mut self, cart_id: CartId) -> Result<&mut CartRecord> {
        let cart = self
            .carts
            .get_mut(&cart_id)
            .ok_or(StoreError::CartNotFound(cart_id))?;
        if cart.status != CartStatus::Open {
            return Err(StoreError::CartNotOpen {
                cart_id,
                status: cart.status,
            });
        }
        Ok(cart)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_cart_status_update: AtomicBool,
    fail_commit: AtomicBool,
}

/// Shared in-memory database handle.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

/// Transaction context for the in-memory stores.
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    pub(crate) staged: Tables,
}

impl InMemoryDatabase {
    /// Creates a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next cart status flip fail, as a lost connection would.
    pub fn fail_next_cart_status_update(&self) {
        self.faults
            .fail_cart_status_update
            .store(true, Ordering::SeqCst);
    }

    /// Makes the next commit fail.
    pub fn fail_next_commit(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the total number of carts stored.
    pub async fn cart_count(&self) -> usize {
        self.tables.lock().await.carts.len()
    }

    /// Returns the number of OPEN carts the user has.
    pub async fn open_cart_count(&self, user_id: UserId) -> usize {
        self.tables
            .lock()
            .await
            .carts
            .values()
            .filter(|cart| cart.user_id == user_id && cart.status == CartStatus::Open)
            .count()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Clears all carts and orders.
    pub async fn clear(&self) {
        let mut tables = self.tables.lock().await;
        tables.carts.clear();
        tables.orders.clear();
    }

    pub(crate) async fn begin(&self) -> MemoryTransaction {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        MemoryTransaction { guard, staged }
    }

    pub(crate) fn commit(&self, tx: MemoryTransaction) -> Result<()> {
        if self.faults.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::TransactionFailed(
                "injected commit failure".to_string(),
            ));
        }
        let MemoryTransaction { mut guard, staged } = tx;
        *guard = staged;
        Ok(())
    }

    pub(crate) fn take_status_update_fault(&self) -> bool {
        self.faults
            .fail_cart_status_update
            .swap(false, Ordering::SeqCst)
    }
}
