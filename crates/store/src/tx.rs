//! Transaction context shared by the stores.

use async_trait::async_trait;

use crate::Result;

/// A store that can open transactions against its backing database.
///
/// `Tx` is the transaction context: store operations taking `&mut Self::Tx`
/// join the caller's transaction instead of running in their own unit.
/// Stores backed by the same database expose the same `Tx` type so one
/// context can span both.
#[async_trait]
pub trait Transactional: Send + Sync {
    /// Transaction context handle.
    type Tx: Send;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Commits the transaction, making every write in it visible.
    ///
    /// Fails with `TransactionFailed` if the commit is rejected.
    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    /// Discards every write made in the transaction.
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;
}

/// Commits `tx` if `result` is `Ok`, otherwise rolls it back and returns the
/// original error.
pub async fn finish<S, T>(store: &S, tx: S::Tx, result: Result<T>) -> Result<T>
where
    S: Transactional + ?Sized,
{
    match result {
        Ok(value) => {
            store.commit(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback(tx).await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
