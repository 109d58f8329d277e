//! PostgreSQL-backed stores.
//!
//! Both stores are constructed from the same [`PgPool`], owned by the
//! process and passed in explicitly, and share [`PgTransaction`] as their
//! transaction context.

mod cart;
mod order;

pub use cart::PgCartStore;
pub use order::PgOrderStore;

use sqlx::{PgPool, Postgres, Transaction};

use crate::{Result, StoreError};

/// Transaction context for the PostgreSQL stores.
pub type PgTransaction = Transaction<'static, Postgres>;

/// Name of the partial unique index enforcing one OPEN cart per user.
pub(crate) const OPEN_CART_CONSTRAINT: &str = "one_open_cart_per_user";

/// Name of the unique constraint enforcing one order per cart.
pub(crate) const ORDER_CART_CONSTRAINT: &str = "one_order_per_cart";

/// SQLSTATE for `numeric_value_out_of_range`.
pub(crate) const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

pub(crate) async fn begin(pool: &PgPool) -> Result<PgTransaction> {
    Ok(pool.begin().await?)
}

pub(crate) async fn commit(tx: PgTransaction) -> Result<()> {
    tx.commit()
        .await
        .map_err(|e| StoreError::TransactionFailed(e.to_string()))
}

pub(crate) async fn rollback(tx: PgTransaction) -> Result<()> {
    Ok(tx.rollback().await?)
}

/// Returns the violated constraint name, if `err` is a constraint violation.
pub(crate) fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Returns true if `err` carries the given SQLSTATE.
pub(crate) fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}
