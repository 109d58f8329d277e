//! Order lookups and fulfillment updates.

use common::{OrderId, UserId};
use store::{Order, OrderPatch, OrderStore, OrderStoreExt};

use crate::ServiceError;

/// Read and update access to stored orders.
pub struct OrderService<O> {
    orders: O,
}

impl<O: OrderStore> OrderService<O> {
    pub fn new(orders: O) -> Self {
        Self { orders }
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// Returns an order owned by `user_id`.
    ///
    /// Orders of other users are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ServiceError> {
        match self.orders.find_by_id(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(ServiceError::OrderNotFound(order_id)),
        }
    }

    /// Applies a partial update to an order owned by `user_id`.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, ServiceError> {
        self.get_order(user_id, order_id).await?;
        let order = self.orders.update_fields(order_id, patch).await?;
        tracing::info!(%order_id, status = %order.status.as_str(), "order updated");
        Ok(order)
    }
}
