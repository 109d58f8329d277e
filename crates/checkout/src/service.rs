//! The cart-to-order transition.

use std::time::Instant;

use catalog::Catalog;
use common::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use store::{Cart, CartStore, CartStoreExt, NewOrder, Order, OrderStore, StoreError};

use crate::{ServiceError, populate};

/// Payment, delivery and comments supplied by the user at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment: Value,
    pub delivery: Value,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Converts a user's OPEN cart into an order.
///
/// The order insert and the cart status flip run in one transaction shared
/// by both stores, so either both are visible or neither is.
pub struct CheckoutService<C, O, K> {
    carts: C,
    orders: O,
    catalog: K,
}

impl<C, O, K> CheckoutService<C, O, K>
where
    C: CartStore,
    O: OrderStore<Tx = C::Tx>,
    K: Catalog,
{
    pub fn new(carts: C, orders: O, catalog: K) -> Self {
        Self {
            carts,
            orders,
            catalog,
        }
    }

    /// Checks out the user's OPEN cart.
    ///
    /// Fails with `NoOpenCart` if the user has no OPEN cart (including when
    /// a concurrent checkout won), `EmptyCart` if it has no items, `Pricing`
    /// if any item cannot be priced and `TransactionFailed` if the order
    /// could not be committed. On failure the cart stays OPEN and unchanged.
    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.run(user_id, request).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    cart_id = %order.cart_id,
                    total = %order.total,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(%user_id, error = %e, "checkout failed");
            }
        }

        result
    }

    async fn run(&self, user_id: UserId, request: CheckoutRequest) -> Result<Order, ServiceError> {
        let cart = self
            .carts
            .get_open_cart(user_id)
            .await?
            .ok_or(ServiceError::NoOpenCart(user_id))?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart(cart.id));
        }

        let priced = populate(&self.catalog, &cart)
            .await
            .map_err(ServiceError::Pricing)?;

        let order = NewOrder {
            user_id,
            cart_id: cart.id,
            payment: request.payment,
            delivery: request.delivery,
            comments: request.comments,
            total: priced.total()?,
        };

        let mut tx = self
            .carts
            .begin()
            .await
            .map_err(|source| ServiceError::TransactionFailed {
                cart_id: cart.id,
                source,
            })?;

        match self.place_order(&mut tx, &cart, order).await {
            Ok(order) => {
                self.carts
                    .commit(tx)
                    .await
                    .map_err(|source| ServiceError::TransactionFailed {
                        cart_id: cart.id,
                        source,
                    })?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = self.carts.rollback(tx).await {
                    tracing::warn!(cart_id = %cart.id, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Locks the OPEN cart, checks it still matches the priced snapshot,
    /// then inserts the order and flips the cart to ORDERED.
    async fn place_order(
        &self,
        tx: &mut C::Tx,
        snapshot: &Cart,
        order: NewOrder,
    ) -> Result<Order, ServiceError> {
        let cart_id = snapshot.id;
        let failed = |source| ServiceError::TransactionFailed { cart_id, source };

        let locked = self
            .carts
            .lock_open_cart_in(tx, snapshot.user_id)
            .await
            .map_err(failed)?;
        let Some(locked) = locked else {
            return Err(ServiceError::NoOpenCart(snapshot.user_id));
        };
        if locked.id != cart_id || locked.items != snapshot.items {
            return Err(failed(StoreError::TransactionFailed(
                "cart changed while it was being priced".into(),
            )));
        }

        let order = self
            .orders
            .create_order_in(tx, order)
            .await
            .map_err(failed)?;
        self.carts
            .mark_ordered_in(tx, cart_id)
            .await
            .map_err(failed)?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{InMemoryCatalog, Product};
    use common::{ErrorKind, Money, ProductId};
    use serde_json::json;
    use store::{InMemoryCartStore, InMemoryDatabase, InMemoryOrderStore};

    type TestService = CheckoutService<InMemoryCartStore, InMemoryOrderStore, InMemoryCatalog>;

    fn setup() -> (TestService, InMemoryDatabase) {
        let db = InMemoryDatabase::new();
        let service = CheckoutService::new(
            InMemoryCartStore::new(db.clone()),
            InMemoryOrderStore::new(db.clone()),
            InMemoryCatalog::new(),
        );
        (service, db)
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            payment: json!({"method": "card"}),
            delivery: json!({"address": "1 Main St", "firstName": "Ada", "lastName": "Lovelace"}),
            comments: Some("leave at the door".into()),
        }
    }

    #[tokio::test]
    async fn checkout_without_cart_is_not_found() {
        let (service, _) = setup();
        let user_id = UserId::new();

        let err = service.checkout(user_id, request()).await.unwrap_err();

        assert!(matches!(err, ServiceError::NoOpenCart(id) if id == user_id));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (service, db) = setup();
        let user_id = UserId::new();
        service.carts.create_cart(user_id).await.unwrap();

        let err = service.checkout(user_id, request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(db.order_count().await, 0);
        assert_eq!(db.open_cart_count(user_id).await, 1);
    }

    #[tokio::test]
    async fn checkout_stores_request_fields() {
        let (service, _) = setup();
        let user_id = UserId::new();
        let product = Product::new(ProductId::new(), "Widget", Money::from_cents(199));
        service.catalog.insert(product.clone());
        let cart = service.carts.create_cart(user_id).await.unwrap();
        service
            .carts
            .upsert_item(cart.id, product.id, 3)
            .await
            .unwrap();

        let order = service.checkout(user_id, request()).await.unwrap();

        assert_eq!(order.cart_id, cart.id);
        assert_eq!(order.user_id, user_id);
        assert_eq!(order.total, Money::from_cents(597));
        assert_eq!(order.payment, json!({"method": "card"}));
        assert_eq!(order.comments.as_deref(), Some("leave at the door"));
    }

    #[tokio::test]
    async fn commit_failure_leaves_cart_open() {
        let (service, db) = setup();
        let user_id = UserId::new();
        let product = Product::new(ProductId::new(), "Widget", Money::from_cents(100));
        service.catalog.insert(product.clone());
        let cart = service.carts.create_cart(user_id).await.unwrap();
        service
            .carts
            .upsert_item(cart.id, product.id, 1)
            .await
            .unwrap();

        db.fail_next_commit();
        let err = service.checkout(user_id, request()).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::TransactionFailed { cart_id, .. } if cart_id == cart.id
        ));
        assert_eq!(db.order_count().await, 0);
        let still_open = service.carts.get_open_cart(user_id).await.unwrap().unwrap();
        assert_eq!(still_open.id, cart.id);
        assert_eq!(still_open.item(product.id).map(|i| i.count), Some(1));
    }
}
