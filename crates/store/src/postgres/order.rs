use async_trait::async_trait;
use common::{CartId, Money, OrderId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{ORDER_CART_CONSTRAINT, PgTransaction, violated_constraint};
use crate::tx::Transactional;
use crate::{NewOrder, Order, OrderPatch, OrderStatus, OrderStore, Result, StoreError};

const ORDER_COLUMNS: &str =
    "id, user_id, cart_id, payment, delivery, comments, status, total, created_at, updated_at";

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Creates a new order store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            payment: row.try_get("payment")?,
            delivery: row.try_get("delivery")?,
            comments: row.try_get("comments")?,
            status: status.parse()?,
            total: Money::new(row.try_get::<Decimal, _>("total")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn find_one(tx: &mut PgTransaction, column: &str, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1");
        let row: Option<PgRow> = sqlx::query(&sql).bind(id).fetch_optional(&mut **tx).await?;
        row.map(Self::row_to_order).transpose()
    }
}

#[async_trait]
impl Transactional for PgOrderStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        super::begin(&self.pool).await
    }

    async fn commit(&self, tx: PgTransaction) -> Result<()> {
        super::commit(tx).await
    }

    async fn rollback(&self, tx: PgTransaction) -> Result<()> {
        super::rollback(tx).await
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order_in(&self, tx: &mut PgTransaction, order: NewOrder) -> Result<Order> {
        let cart_id = order.cart_id;
        let sql = format!(
            r#"
            INSERT INTO orders (id, user_id, cart_id, payment, delivery, comments, status, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(OrderId::new().as_uuid())
            .bind(order.user_id.as_uuid())
            .bind(cart_id.as_uuid())
            .bind(order.payment)
            .bind(order.delivery)
            .bind(order.comments)
            .bind(OrderStatus::Open.as_str())
            .bind(order.total.amount())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some(ORDER_CART_CONSTRAINT) {
                    return StoreError::OrderExistsForCart(cart_id);
                }
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::CartNotFound(cart_id);
                }
                StoreError::Database(e)
            })?;

        Self::row_to_order(row)
    }

    async fn find_by_id_in(
        &self,
        tx: &mut PgTransaction,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        Self::find_one(tx, "id", order_id.as_uuid()).await
    }

    async fn find_by_cart_in(
        &self,
        tx: &mut PgTransaction,
        cart_id: CartId,
    ) -> Result<Option<Order>> {
        Self::find_one(tx, "cart_id", cart_id.as_uuid()).await
    }

    async fn update_fields_in(
        &self,
        tx: &mut PgTransaction,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order> {
        if patch.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        // $1 is the order id; patched columns follow in a fixed order.
        let mut sql = String::from("UPDATE orders SET updated_at = NOW()");
        let mut param_count = 1;

        if patch.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(", status = ${param_count}"));
        }
        if patch.payment.is_some() {
            param_count += 1;
            sql.push_str(&format!(", payment = ${param_count}"));
        }
        if patch.delivery.is_some() {
            param_count += 1;
            sql.push_str(&format!(", delivery = ${param_count}"));
        }
        if patch.comments.is_some() {
            param_count += 1;
            sql.push_str(&format!(", comments = ${param_count}"));
        }
        sql.push_str(&format!(" WHERE id = $1 RETURNING {ORDER_COLUMNS}"));

        let mut query = sqlx::query(&sql).bind(order_id.as_uuid());
        if let Some(status) = patch.status {
            query = query.bind(status.as_str());
        }
        if let Some(payment) = patch.payment {
            query = query.bind(payment);
        }
        if let Some(delivery) = patch.delivery {
            query = query.bind(delivery);
        }
        if let Some(comments) = patch.comments {
            query = query.bind(comments);
        }

        let row: Option<PgRow> = query.fetch_optional(&mut **tx).await?;
        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(StoreError::OrderNotFound(order_id)),
        }
    }
}
