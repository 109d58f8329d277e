//! Cart operations for a user.

use catalog::Catalog;
use common::{ProductId, UserId};
use store::{Cart, CartItem, CartStore, CartStoreExt};

use crate::{PopulatedCart, ServiceError, populate};

/// Service for managing a user's OPEN cart.
///
/// Every operation addresses the cart by user; the cart id never leaves
/// the storage boundary.
pub struct CartService<C, K> {
    carts: C,
    catalog: K,
}

impl<C, K> CartService<C, K>
where
    C: CartStore,
    K: Catalog,
{
    pub fn new(carts: C, catalog: K) -> Self {
        Self { carts, catalog }
    }

    pub fn carts(&self) -> &C {
        &self.carts
    }

    pub fn catalog(&self) -> &K {
        &self.catalog
    }

    /// Returns the user's OPEN cart, creating it on first access, priced
    /// with current catalog data.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<PopulatedCart, ServiceError> {
        let cart = self.carts.get_or_create_open_cart(user_id).await?;
        Ok(populate(&self.catalog, &cart).await?)
    }

    /// Adds `count` units of a product, creating the cart if needed.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        count: i32,
    ) -> Result<CartItem, ServiceError> {
        let cart = self.carts.get_or_create_open_cart(user_id).await?;
        Ok(self.carts.upsert_item(cart.id, product_id, count).await?)
    }

    /// Sets the absolute count of a product already in the cart.
    ///
    /// Returns `None` when `count` is zero and the item was removed.
    #[tracing::instrument(skip(self))]
    pub async fn set_item_count(
        &self,
        user_id: UserId,
        product_id: ProductId,
        count: i32,
    ) -> Result<Option<CartItem>, ServiceError> {
        let cart = self.open_cart(user_id).await?;
        let item = self
            .carts
            .set_item_count(cart.id, product_id, count)
            .await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), ServiceError> {
        let cart = self.open_cart(user_id).await?;
        Ok(self.carts.remove_item(cart.id, product_id).await?)
    }

    /// Deletes the user's OPEN cart and its items.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<(), ServiceError> {
        let cart = self.open_cart(user_id).await?;
        Ok(self.carts.delete_cart(cart.id).await?)
    }

    async fn open_cart(&self, user_id: UserId) -> Result<Cart, ServiceError> {
        match self.carts.get_open_cart(user_id).await? {
            Some(cart) => Ok(cart),
            None => {
                tracing::warn!(%user_id, "no open cart");
                Err(ServiceError::NoOpenCart(user_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{InMemoryCatalog, Product};
    use common::{ErrorKind, Money};
    use store::{InMemoryCartStore, InMemoryDatabase, StoreError};

    fn service() -> (CartService<InMemoryCartStore, InMemoryCatalog>, InMemoryDatabase) {
        let db = InMemoryDatabase::new();
        let service = CartService::new(InMemoryCartStore::new(db.clone()), InMemoryCatalog::new());
        (service, db)
    }

    #[tokio::test]
    async fn get_cart_creates_empty_cart_once() {
        let (service, db) = service();
        let user_id = UserId::new();

        let first = service.get_cart(user_id).await.unwrap();
        let second = service.get_cart(user_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.items.is_empty());
        assert_eq!(db.cart_count().await, 1);
        assert_eq!(service.catalog().lookup_count(), 0);
    }

    #[tokio::test]
    async fn add_item_merges_and_prices() {
        let (service, _) = service();
        let user_id = UserId::new();
        let product = Product::new(ProductId::new(), "Widget", Money::from_cents(1000));
        service.catalog().insert(product.clone());

        service.add_item(user_id, product.id, 3).await.unwrap();
        let item = service.add_item(user_id, product.id, 2).await.unwrap();
        assert_eq!(item.count, 5);

        let cart = service.get_cart(user_id).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total().unwrap(), Money::from_cents(5000));
    }

    #[tokio::test]
    async fn add_item_rejects_non_positive_count() {
        let (service, _) = service();

        let err = service
            .add_item(UserId::new(), ProductId::new(), 0)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn set_count_zero_removes_item() {
        let (service, _) = service();
        let user_id = UserId::new();
        let product_id = ProductId::new();
        service.add_item(user_id, product_id, 2).await.unwrap();

        assert!(
            service
                .set_item_count(user_id, product_id, 0)
                .await
                .unwrap()
                .is_none()
        );

        let err = service.remove_item(user_id, product_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Store(StoreError::ItemNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn mutations_without_cart_are_not_found() {
        let (service, _) = service();
        let user_id = UserId::new();

        let err = service
            .set_item_count(user_id, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoOpenCart(id) if id == user_id));

        let err = service.clear_cart(user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn clear_cart_deletes_it() {
        let (service, db) = service();
        let user_id = UserId::new();
        service
            .add_item(user_id, ProductId::new(), 1)
            .await
            .unwrap();

        service.clear_cart(user_id).await.unwrap();

        assert_eq!(db.cart_count().await, 0);
    }

    #[tokio::test]
    async fn get_cart_with_unknown_product_is_not_found() {
        let (service, _) = service();
        let user_id = UserId::new();
        service
            .add_item(user_id, ProductId::new(), 1)
            .await
            .unwrap();

        let err = service.get_cart(user_id).await.unwrap_err();

        assert!(matches!(err, ServiceError::Enrichment(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
