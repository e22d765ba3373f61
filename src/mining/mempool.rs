//! Pending transaction pool
//!
//! Holds validated transactions waiting to be mined. No two pooled
//! transactions ever spend the same output.

use thiserror::Error;

use crate::crypto::Hash;
use crate::error::ErrorKind;
use crate::storage::UTXOSet;
use crate::validation::{validate_transaction, Transaction, TxError};

/// Mempool admission errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Invalid transaction: {0}")]
    Invalid(#[from] TxError),
    #[error("Output {tx_out_id}:{tx_out_index} is already spent by a pending transaction")]
    AlreadyPending { tx_out_id: Hash, tx_out_index: u32 },
}

impl MempoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MempoolError::Invalid(e) => e.kind(),
            MempoolError::AlreadyPending { .. } => ErrorKind::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Transaction pool, kept in admission order
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tx` against `utxo_set` and add it to the pool
    pub fn admit(&mut self, tx: Transaction, utxo_set: &UTXOSet) -> Result<(), MempoolError> {
        validate_transaction(&tx, utxo_set)?;

        if let Some(input) = tx
            .tx_ins
            .iter()
            .find(|input| self.is_spent(&input.tx_out_id, input.tx_out_index))
        {
            return Err(MempoolError::AlreadyPending {
                tx_out_id: input.tx_out_id,
                tx_out_index: input.tx_out_index,
            });
        }

        log::debug!("Admitted transaction {} to mempool", tx.id);
        self.transactions.push(tx);
        Ok(())
    }

    /// Drop every transaction with an input missing from `utxo_set`
    ///
    /// Returns the number of transactions removed.
    pub fn prune(&mut self, utxo_set: &UTXOSet) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|tx| {
            tx.tx_ins
                .iter()
                .all(|input| utxo_set.contains(&input.tx_out_id, input.tx_out_index))
        });

        let removed = before - self.transactions.len();
        if removed > 0 {
            log::debug!("Pruned {} stale transactions from mempool", removed);
        }
        removed
    }

    /// Whether a pooled transaction already spends this output
    pub fn is_spent(&self, tx_out_id: &Hash, tx_out_index: u32) -> bool {
        self.transactions
            .iter()
            .flat_map(|tx| tx.tx_ins.iter())
            .any(|input| input.tx_out_id == *tx_out_id && input.tx_out_index == tx_out_index)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
