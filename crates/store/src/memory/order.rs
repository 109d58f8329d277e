use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, OrderId};

use super::{InMemoryDatabase, MemoryTransaction};
use crate::tx::Transactional;
use crate::{NewOrder, Order, OrderPatch, OrderStatus, OrderStore, Result, StoreError};

/// In-memory order store implementation for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    db: InMemoryDatabase,
}

impl InMemoryOrderStore {
    /// Creates an order store on the given database.
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &InMemoryDatabase {
        &self.db
    }
}

#[async_trait]
impl Transactional for InMemoryOrderStore {
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
impl OrderStore for InMemoryOrderStore {
    async fn create_order_in(&self, tx: &mut MemoryTransaction, order: NewOrder) -> Result<Order> {
        let tables = &mut tx.staged;

        // Foreign key and unique(cart_id) simulation
        if !tables.carts.contains_key(&order.cart_id) {
            return Err(StoreError::CartNotFound(order.cart_id));
        }
        if tables.orders.values().any(|o| o.cart_id == order.cart_id) {
            return Err(StoreError::OrderExistsForCart(order.cart_id));
        }

        let now = Utc::now();
        let stored = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            cart_id: order.cart_id,
            payment: order.payment,
            delivery: order.delivery,
            comments: order.comments,
            status: OrderStatus::Open,
            total: order.total,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id_in(
        &self,
        tx: &mut MemoryTransaction,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        Ok(tx.staged.orders.get(&order_id).cloned())
    }

    async fn find_by_cart_in(
        &self,
        tx: &mut MemoryTransaction,
        cart_id: CartId,
    ) -> Result<Option<Order>> {
        Ok(tx
            .staged
            .orders
            .values()
            .find(|o| o.cart_id == cart_id)
            .cloned())
    }

    async fn update_fields_in(
        &self,
        tx: &mut MemoryTransaction,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order> {
        if patch.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        let order = tx
            .staged
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        patch.apply(order);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CartStore, CartStoreExt, InMemoryCartStore, OrderStoreExt};
    use common::{Money, UserId};
    use serde_json::json;

    struct Fixture {
        carts: InMemoryCartStore,
        orders: InMemoryOrderStore,
    }

    fn fixture() -> Fixture {
        let db = InMemoryDatabase::new();
        Fixture {
            carts: InMemoryCartStore::new(db.clone()),
            orders: InMemoryOrderStore::new(db),
        }
    }

    fn new_order(user_id: UserId, cart_id: CartId) -> NewOrder {
        NewOrder {
            user_id,
            cart_id,
            payment: json!({"method": "card"}),
            delivery: json!({"address": "1 Main St", "firstName": "Ada", "lastName": "Lovelace"}),
            comments: Some("leave at door".to_string()),
            total: Money::from_cents(4500),
        }
    }

    #[tokio::test]
    async fn create_and_find_order() {
        let f = fixture();
        let user_id = UserId::new();
        let cart = f.carts.create_cart(user_id).await.unwrap();

        let order = f
            .orders
            .create_order(new_order(user_id, cart.id))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.total, Money::from_cents(4500));
        let found = f.orders.find_by_id(order.id).await.unwrap();
        assert_eq!(found, Some(order.clone()));
        assert_eq!(f.orders.find_by_cart(cart.id).await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn find_missing_order_returns_none() {
        let f = fixture();
        assert!(f.orders.find_by_id(OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn one_order_per_cart() {
        let f = fixture();
        let user_id = UserId::new();
        let cart = f.carts.create_cart(user_id).await.unwrap();
        f.orders
            .create_order(new_order(user_id, cart.id))
            .await
            .unwrap();

        let second = f.orders.create_order(new_order(user_id, cart.id)).await;

        assert!(matches!(second, Err(StoreError::OrderExistsForCart(_))));
        assert_eq!(f.orders.database().order_count().await, 1);
    }

    #[tokio::test]
    async fn order_requires_existing_cart() {
        let f = fixture();
        let result = f
            .orders
            .create_order(new_order(UserId::new(), CartId::new()))
            .await;
        assert!(matches!(result, Err(StoreError::CartNotFound(_))));
    }

    #[tokio::test]
    async fn update_fields_changes_status_only() {
        let f = fixture();
        let user_id = UserId::new();
        let cart = f.carts.create_cart(user_id).await.unwrap();
        let order = f
            .orders
            .create_order(new_order(user_id, cart.id))
            .await
            .unwrap();

        let updated = f
            .orders
            .update_fields(order.id, OrderPatch::status(OrderStatus::Approved))
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Approved);
        assert_eq!(updated.total, order.total);
        assert_eq!(updated.cart_id, order.cart_id);
        assert_eq!(updated.payment, order.payment);
        assert!(updated.updated_at >= order.updated_at);
    }

    #[tokio::test]
    async fn update_fields_can_clear_comments() {
        let f = fixture();
        let user_id = UserId::new();
        let cart = f.carts.create_cart(user_id).await.unwrap();
        let order = f
            .orders
            .create_order(new_order(user_id, cart.id))
            .await
            .unwrap();

        let patch = OrderPatch {
            comments: Some(None),
            ..OrderPatch::default()
        };
        let updated = f.orders.update_fields(order.id, patch).await.unwrap();

        assert!(updated.comments.is_none());
    }

    #[tokio::test]
    async fn update_missing_order_is_not_found() {
        let f = fixture();
        let result = f
            .orders
            .update_fields(OrderId::new(), OrderPatch::status(OrderStatus::Sent))
            .await;
        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let f = fixture();
        let result = f
            .orders
            .update_fields(OrderId::new(), OrderPatch::default())
            .await;
        assert!(matches!(result, Err(StoreError::EmptyUpdate)));
    }

    #[tokio::test]
    async fn order_and_status_flip_share_one_transaction() {
        let f = fixture();
        let user_id = UserId::new();
        let cart = f.carts.create_cart(user_id).await.unwrap();

        let mut tx = f.carts.begin().await.unwrap();
        f.orders
            .create_order_in(&mut tx, new_order(user_id, cart.id))
            .await
            .unwrap();
        f.carts.mark_ordered_in(&mut tx, cart.id).await.unwrap();
        f.carts.rollback(tx).await.unwrap();

        assert_eq!(f.orders.database().order_count().await, 0);
        let cart = f.carts.get_cart(cart.id).await.unwrap().unwrap();
        assert!(cart.is_open());
    }
}
