use async_trait::async_trait;
use common::{CartId, ProductId, UserId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{
    NUMERIC_OUT_OF_RANGE, OPEN_CART_CONSTRAINT, PgTransaction, has_sqlstate, violated_constraint,
};
use crate::cart::{count_overflow, validate_count, validate_delta};
use crate::tx::Transactional;
use crate::{Cart, CartItem, CartStatus, CartStore, Result, StoreError};

const CART_COLUMNS: &str = "id, user_id, status, created_at, updated_at";

const DELETE_ITEM_SQL: &str = "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2";

/// PostgreSQL-backed cart store.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Creates a new cart store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_cart(row: &PgRow, items: Vec<CartItem>) -> Result<Cart> {
        let status: String = row.try_get("status")?;

        Ok(Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status: status.parse()?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<CartItem> {
        let count: i32 = row.try_get("count")?;
        let count = u32::try_from(count)
            .map_err(|_| StoreError::InvalidRecord(format!("negative item count {count}")))?;

        Ok(CartItem {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            count,
        })
    }

    async fn load_items(conn: &mut PgConnection, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, count
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Runs a cart-row query bound to a single UUID and attaches its items.
    async fn load_cart(conn: &mut PgConnection, sql: &str, id: Uuid) -> Result<Option<Cart>> {
        let row: Option<PgRow> = sqlx::query(sql).bind(id).fetch_optional(&mut *conn).await?;

        match row {
            Some(row) => {
                let cart_id = CartId::from_uuid(row.try_get::<Uuid, _>("id")?);
                let items = Self::load_items(conn, cart_id).await?;
                Ok(Some(Self::row_to_cart(&row, items)?))
            }
            None => Ok(None),
        }
    }

    /// Explains why a status-guarded write matched no cart row.
    async fn unmodified_cart_error(conn: &mut PgConnection, cart_id: CartId) -> StoreError {
        let status: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM carts WHERE id = $1")
                .bind(cart_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await;

        match status {
            Ok(None) => StoreError::CartNotFound(cart_id),
            Ok(Some(status)) => match status.parse::<CartStatus>() {
                Ok(status) => StoreError::CartNotOpen { cart_id, status },
                Err(e) => e,
            },
            Err(e) => StoreError::Database(e),
        }
    }

    /// Bumps `updated_at` on an OPEN cart, taking its row lock.
    ///
    /// Every item mutation starts here so it queues behind a checkout holding
    /// the lock and is rejected once the cart has been ordered.
    async fn touch_open_cart(conn: &mut PgConnection, cart_id: CartId) -> Result<()> {
        let touched = sqlx::query(
            r#"
            UPDATE carts
            SET updated_at = NOW()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if touched == 0 {
            return Err(Self::unmodified_cart_error(conn, cart_id).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Transactional for PgCartStore {
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
impl CartStore for PgCartStore {
    async fn get_open_cart_in(
        &self,
        tx: &mut PgTransaction,
        user_id: UserId,
    ) -> Result<Option<Cart>> {
        let sql = format!(
            r#"
            SELECT {CART_COLUMNS}
            FROM carts
            WHERE user_id = $1 AND status = 'OPEN'
            "#
        );
        Self::load_cart(tx, &sql, user_id.as_uuid()).await
    }

    async fn lock_open_cart_in(
        &self,
        tx: &mut PgTransaction,
        user_id: UserId,
    ) -> Result<Option<Cart>> {
        // Under READ COMMITTED a row flipped by a concurrent checkout is
        // re-checked after the lock wait and drops out of the result.
        let sql = format!(
            r#"
            SELECT {CART_COLUMNS}
            FROM carts
            WHERE user_id = $1 AND status = 'OPEN'
            FOR UPDATE
            "#
        );
        Self::load_cart(tx, &sql, user_id.as_uuid()).await
    }

    async fn get_cart_in(&self, tx: &mut PgTransaction, cart_id: CartId) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1");
        Self::load_cart(tx, &sql, cart_id.as_uuid()).await
    }

    async fn create_cart_in(&self, tx: &mut PgTransaction, user_id: UserId) -> Result<Cart> {
        let sql = format!(
            r#"
            INSERT INTO carts (id, user_id, status)
            VALUES ($1, $2, 'OPEN')
            RETURNING {CART_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(CartId::new().as_uuid())
            .bind(user_id.as_uuid())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some(OPEN_CART_CONSTRAINT) {
                    return StoreError::OpenCartExists(user_id);
                }
                StoreError::Database(e)
            })?;

        metrics::counter!("carts_created_total").increment(1);
        let cart = Self::row_to_cart(&row, Vec::new())?;
        tracing::info!(cart_id = %cart.id, %user_id, "cart created");
        Ok(cart)
    }

    async fn get_or_create_open_cart_in(
        &self,
        tx: &mut PgTransaction,
        user_id: UserId,
    ) -> Result<Cart> {
        // The insert waits on a concurrent uncommitted insert for the same
        // user and then does nothing, so the read below sees the winner.
        let inserted = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, status)
            VALUES ($1, $2, 'OPEN')
            ON CONFLICT (user_id) WHERE status = 'OPEN' DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(user_id.as_uuid())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            metrics::counter!("carts_created_total").increment(1);
            tracing::info!(%user_id, "cart created");
        }

        self.get_open_cart_in(tx, user_id).await?.ok_or_else(|| {
            StoreError::TransactionFailed(format!(
                "open cart for user {user_id} disappeared during creation"
            ))
        })
    }

    async fn upsert_item_in(
        &self,
        tx: &mut PgTransaction,
        cart_id: CartId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<CartItem> {
        validate_delta(delta)?;
        Self::touch_open_cart(tx, cart_id).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET count = cart_items.count + EXCLUDED.count
            RETURNING product_id, count
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(delta)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, NUMERIC_OUT_OF_RANGE) {
                return count_overflow(delta);
            }
            StoreError::Database(e)
        })?;

        metrics::counter!("cart_item_mutations_total", "op" => "upsert").increment(1);
        Self::row_to_item(&row)
    }

    async fn set_item_count_in(
        &self,
        tx: &mut PgTransaction,
        cart_id: CartId,
        product_id: ProductId,
        count: i32,
    ) -> Result<Option<CartItem>> {
        validate_count(count)?;
        Self::touch_open_cart(tx, cart_id).await?;

        if count == 0 {
            sqlx::query(DELETE_ITEM_SQL)
                .bind(cart_id.as_uuid())
                .bind(product_id.as_uuid())
                .execute(&mut **tx)
                .await?;
            metrics::counter!("cart_item_mutations_total", "op" => "set").increment(1);
            return Ok(None);
        }

        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE cart_items
            SET count = $3
            WHERE cart_id = $1 AND product_id = $2
            RETURNING product_id, count
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(count)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::ItemNotFound {
                cart_id,
                product_id,
            });
        };
        metrics::counter!("cart_item_mutations_total", "op" => "set").increment(1);
        Ok(Some(Self::row_to_item(&row)?))
    }

    async fn remove_item_in(
        &self,
        tx: &mut PgTransaction,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<()> {
        Self::touch_open_cart(tx, cart_id).await?;

        let deleted = sqlx::query(DELETE_ITEM_SQL)
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::ItemNotFound {
                cart_id,
                product_id,
            });
        }
        metrics::counter!("cart_item_mutations_total", "op" => "remove").increment(1);
        Ok(())
    }

    async fn delete_cart_in(&self, tx: &mut PgTransaction, cart_id: CartId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM carts WHERE id = $1 AND status = 'OPEN'")
            .bind(cart_id.as_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(Self::unmodified_cart_error(tx, cart_id).await);
        }
        tracing::info!(%cart_id, "cart deleted");
        Ok(())
    }

    async fn mark_ordered_in(&self, tx: &mut PgTransaction, cart_id: CartId) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE carts
            SET status = 'ORDERED', updated_at = NOW()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Self::unmodified_cart_error(tx, cart_id).await);
        }
        Ok(())
    }
}
