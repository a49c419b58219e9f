//! Stock-ledger transition engine.
//!
//! Moves a DRAFT transaction to COMPLETED while applying its stock effects,
//! all inside one atomic store scope:
//!
//! ```text
//! begin scope
//!   ↓
//! 1. load transaction FOR UPDATE (NotFound / InvalidState if not DRAFT)
//!   ↓
//! 2. for each item, for each planned movement:
//!      increment or conditional decrement → append ledger row
//!   ↓
//! 3. mark COMPLETED, save, commit
//! ```
//!
//! Any failure drops the scope before commit, so stock, ledger and status are
//! left exactly as they were. Store conflicts (serialization failures,
//! deadlocks) re-run the whole attempt up to `max_attempts` times; every
//! attempt is bounded by `attempt_timeout`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use stockledger_core::TransactionId;
use stockledger_inventory::{LedgerEntry, NewLedgerEntry, StockTransaction};

use crate::error::{InventoryError, InventoryResult, StoreError};
use crate::store::{Decrement, InventoryStore, StockLedgerTx};

/// Retry and timeout policy of [`TransitionEngine::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts before giving up on repeated store conflicts. At least 1.
    pub max_attempts: u32,
    /// Bound on one attempt, lock waits included.
    pub attempt_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn InventoryStore>,
    config: EngineConfig,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn InventoryStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Complete a DRAFT transaction and apply its stock movements atomically.
    #[instrument(skip(self), fields(transaction_id = %id))]
    pub async fn validate(&self, id: TransactionId) -> InventoryResult<StockTransaction> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_conflict = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.attempt_timeout, self.attempt(id)).await {
                Ok(Ok(txn)) => {
                    info!(
                        attempt,
                        transaction_type = txn.transaction_type().as_str(),
                        items = txn.items.len(),
                        "transaction validated"
                    );
                    return Ok(txn);
                }
                Ok(Err(InventoryError::Store(err))) if err.is_retryable() => {
                    warn!(attempt, max_attempts = attempts, error = %err, "validation conflicted, retrying");
                    last_conflict = err.to_string();
                }
                Ok(Err(err)) => {
                    if let InventoryError::InsufficientStock {
                        product_id,
                        warehouse_id,
                        requested,
                        available,
                    } = &err
                    {
                        warn!(%product_id, %warehouse_id, requested, available, "insufficient stock");
                    }
                    return Err(err);
                }
                Err(_) => {
                    warn!(attempt, timeout_ms = self.config.attempt_timeout.as_millis() as u64, "validation timed out");
                    return Err(InventoryError::Store(StoreError::Timeout(format!(
                        "validation of transaction {id} exceeded {:?}",
                        self.config.attempt_timeout
                    ))));
                }
            }
        }

        Err(InventoryError::ConcurrencyConflict(format!(
            "transaction {id} could not be validated after {attempts} attempts: {last_conflict}"
        )))
    }

    async fn attempt(&self, id: TransactionId) -> InventoryResult<StockTransaction> {
        let mut scope = self.store.begin().await?;

        let mut txn = scope
            .transaction_for_update(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("transaction", id))?;
        txn.ensure_draft()?;

        apply_movements(scope.as_mut(), &txn).await?;

        txn.complete(Utc::now())?;
        scope.save_transaction(&txn).await?;
        scope.commit().await?;
        Ok(txn)
    }
}

/// Apply every planned movement of `txn` in order, appending one ledger row
/// per movement. Stops at the first refused decrement.
pub async fn apply_movements(
    scope: &mut dyn StockLedgerTx,
    txn: &StockTransaction,
) -> InventoryResult<Vec<LedgerEntry>> {
    let movements = txn.planned_movements();
    let mut entries = Vec::with_capacity(movements.len());

    for movement in &movements {
        let balance_after = if movement.is_decrement() {
            match scope.decrement(&movement.key, movement.magnitude()).await? {
                Decrement::Applied(quantity) => quantity,
                Decrement::Insufficient { available } => {
                    return Err(InventoryError::InsufficientStock {
                        product_id: movement.key.product_id,
                        warehouse_id: movement.key.warehouse_id,
                        requested: movement.magnitude(),
                        available,
                    });
                }
            }
        } else {
            scope.increment(&movement.key, movement.delta).await?
        };

        let entry = scope
            .append_ledger(NewLedgerEntry::for_movement(txn.id, movement, balance_after))
            .await?;
        entries.push(entry);
    }

    Ok(entries)
}
