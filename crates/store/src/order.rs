//! Orders, partial updates and the order store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tx::{Transactional, finish};
use crate::{Result, StoreError};

/// Fulfillment state of an order.
///
/// Orders start OPEN; every later transition is driven by an external
/// fulfillment process through [`OrderStore::update_fields_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Open,
    Approved,
    Confirmed,
    Sent,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Sent => "SENT",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(OrderStatus::Open),
            "APPROVED" => Ok(OrderStatus::Approved),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "SENT" => Ok(OrderStatus::Sent),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// A stored order. `total`, `user_id` and `cart_id` never change after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub cart_id: CartId,
    pub payment: Value,
    pub delivery: Value,
    pub comments: Option<String>,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields supplied when inserting an order.
///
/// The store generates the id and timestamps and sets the status to OPEN.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub cart_id: CartId,
    pub payment: Value,
    pub delivery: Value,
    pub comments: Option<String>,
    pub total: Money,
}

/// A partial update of the mutable order fields.
///
/// `total`, `user_id` and `cart_id` have no slot here, so they cannot be
/// changed through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment: Option<Value>,
    pub delivery: Option<Value>,
    /// `Some(None)` clears the comments.
    pub comments: Option<Option<String>>,
}

const IMMUTABLE_FIELDS: &[&str] = &[
    "id",
    "total",
    "userId",
    "user_id",
    "cartId",
    "cart_id",
    "createdAt",
    "created_at",
    "updatedAt",
    "updated_at",
];

impl OrderPatch {
    /// Creates a patch that only changes the status.
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment.is_none()
            && self.delivery.is_none()
            && self.comments.is_none()
    }

    /// Parses a generic field map into a patch.
    ///
    /// Immutable fields are rejected with `ImmutableField` and unrecognized
    /// ones with `UnknownField`, rather than being ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut patch = OrderPatch::default();

        for (name, value) in fields {
            match name.as_str() {
                "status" => {
                    let raw = value
                        .as_str()
                        .ok_or_else(|| invalid(name, "expected a string"))?;
                    let status = raw
                        .parse::<OrderStatus>()
                        .map_err(|_| invalid(name, &format!("unknown status '{raw}'")))?;
                    patch.status = Some(status);
                }
                "payment" | "delivery" => {
                    if !value.is_object() {
                        return Err(invalid(name, "expected an object"));
                    }
                    if name == "payment" {
                        patch.payment = Some(value.clone());
                    } else {
                        patch.delivery = Some(value.clone());
                    }
                }
                "comments" => {
                    let comments = match value {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        _ => return Err(invalid(name, "expected a string or null")),
                    };
                    patch.comments = Some(comments);
                }
                other if IMMUTABLE_FIELDS.contains(&other) => {
                    return Err(StoreError::ImmutableField(other.to_string()));
                }
                other => return Err(StoreError::UnknownField(other.to_string())),
            }
        }

        Ok(patch)
    }

    /// Applies the patch to an in-memory order.
    pub(crate) fn apply(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment) = self.payment {
            order.payment = payment;
        }
        if let Some(delivery) = self.delivery {
            order.delivery = delivery;
        }
        if let Some(comments) = self.comments {
            order.comments = comments;
        }
    }
}

fn invalid(field: &str, reason: &str) -> StoreError {
    StoreError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Storage for immutable order records.
#[async_trait]
pub trait OrderStore: Transactional {
    /// Inserts a new OPEN order. Pure insert, no merge semantics.
    ///
    /// Fails with `OrderExistsForCart` if the cart already produced an order.
    async fn create_order_in(&self, tx: &mut Self::Tx, order: NewOrder) -> Result<Order>;

    /// Returns an order by id.
    async fn find_by_id_in(&self, tx: &mut Self::Tx, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns the order produced from a cart.
    async fn find_by_cart_in(&self, tx: &mut Self::Tx, cart_id: CartId) -> Result<Option<Order>>;

    /// Applies a partial update and returns the updated order.
    ///
    /// Fails with `EmptyUpdate` for an empty patch and `OrderNotFound` if the
    /// order does not exist.
    async fn update_fields_in(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order>;
}

/// Auto-committed forms of the [`OrderStore`] operations.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Inserts a new OPEN order in its own transaction.
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self.begin().await?;
        let result = self.create_order_in(&mut tx, order).await;
        finish(self, tx, result).await
    }

    /// Returns an order by id, or `None`.
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut tx = self.begin().await?;
        let result = self.find_by_id_in(&mut tx, order_id).await;
        finish(self, tx, result).await
    }

    /// Returns the order produced from a cart, or `None`.
    async fn find_by_cart(&self, cart_id: CartId) -> Result<Option<Order>> {
        let mut tx = self.begin().await?;
        let result = self.find_by_cart_in(&mut tx, cart_id).await;
        finish(self, tx, result).await
    }

    /// Applies a partial update.
    async fn update_fields(&self, order_id: OrderId, patch: OrderPatch) -> Result<Order> {
        let mut tx = self.begin().await?;
        let result = self.update_fields_in(&mut tx, order_id, patch).await;
        finish(self, tx, result).await
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
