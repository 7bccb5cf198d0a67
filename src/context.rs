//! Transaction contexts
//!
//! Work that spans several resolutions (one request, one job) carries an
//! explicit [`TransactionContext`] value, and the owning component holds a
//! [`TransactionRegistry`] mapping live contexts to their transactions.
//! Passing both explicitly keeps transactions from leaking across requests;
//! there is no process-global table.

use crate::error::BoxError;
use ahash::RandomState;
use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "logging")]
use tracing::debug;

/// Identity of one unit of transactional work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionContext {
    id: Uuid,
}

impl TransactionContext {
    /// Create a fresh context with a random id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The context id.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.id)
    }
}

/// Interface of a live transaction handle.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction.
    async fn commit(&self) -> std::result::Result<(), BoxError>;

    /// Roll the transaction back.
    async fn rollback(&self) -> std::result::Result<(), BoxError>;

    /// Return the underlying connection to its pool.
    async fn release(&self) -> std::result::Result<(), BoxError>;

    /// Whether the handle was already released.
    fn is_released(&self) -> bool;
}

/// Context-keyed registry of live transactions.
///
/// Remember to [`commit`](TransactionRegistry::commit) or
/// [`rollback`](TransactionRegistry::rollback) every context that created a
/// transaction; both remove the entry and release the handle.
pub struct TransactionRegistry<Tx> {
    live: DashMap<Uuid, Arc<Tx>, RandomState>,
}

impl<Tx: Transaction> TransactionRegistry<Tx> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            live: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// The transaction for `ctx`, starting one with `init` only when the
    /// context has none yet.
    pub async fn get_or_create<F, Fut>(
        &self,
        ctx: &TransactionContext,
        init: F,
    ) -> std::result::Result<Arc<Tx>, BoxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Tx, BoxError>>,
    {
        if let Some(existing) = self.live.get(&ctx.id) {
            return Ok(existing.value().clone());
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            context = %ctx,
            "Starting transaction for context"
        );

        let created = Arc::new(init().await?);
        // two overlapping creators race; the first insert wins and the
        // loser's handle is dropped unused
        let winner = self.live.entry(ctx.id).or_insert(created).value().clone();
        Ok(winner)
    }

    /// Commit and release the context's transaction, if one exists.
    pub async fn commit(&self, ctx: &TransactionContext) -> std::result::Result<(), BoxError> {
        if let Some((_, tx)) = self.live.remove(&ctx.id) {
            #[cfg(feature = "logging")]
            debug!(
                target: "inject_container",
                context = %ctx,
                "Committing transaction"
            );

            tx.commit().await?;
            release(tx.as_ref()).await?;
        }
        Ok(())
    }

    /// Roll back and release the context's transaction, if one exists.
    pub async fn rollback(&self, ctx: &TransactionContext) -> std::result::Result<(), BoxError> {
        if let Some((_, tx)) = self.live.remove(&ctx.id) {
            #[cfg(feature = "logging")]
            debug!(
                target: "inject_container",
                context = %ctx,
                "Rolling back transaction"
            );

            tx.rollback().await?;
            release(tx.as_ref()).await?;
        }
        Ok(())
    }

    /// Whether the context has a live transaction.
    pub fn contains(&self, ctx: &TransactionContext) -> bool {
        self.live.contains_key(&ctx.id)
    }

    /// Number of live transactions.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True when no transaction is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl<Tx: Transaction> Default for TransactionRegistry<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

async fn release<Tx: Transaction + ?Sized>(tx: &Tx) -> std::result::Result<(), BoxError> {
    if !tx.is_released() {
        tx.release().await?;
    }
    Ok(())
}
