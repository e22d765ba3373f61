//! UTXO set implementation
//!
//! In-memory set of unspent transaction outputs. Updates never mutate an
//! existing set: applying transactions yields a new set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::{Address, Hash};
use crate::validation::Transaction;

/// Key for UTXO lookup: (tx_out_id, tx_out_index)
pub type UTXOKey = (Hash, u32);

/// Unspent Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UTXO {
    /// Id of the transaction that created this output
    pub tx_out_id: Hash,
    /// Position of the output in that transaction
    pub tx_out_index: u32,
    /// Owner
    pub address: Address,
    /// Amount in base units
    pub amount: u64,
}

/// Set of all unspent transaction outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UTXOSet {
    utxos: BTreeMap<UTXOKey, UTXO>,
}

impl UTXOSet {
    /// Create a new empty UTXO set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a UTXO exists
    pub fn contains(&self, tx_out_id: &Hash, tx_out_index: u32) -> bool {
        self.utxos.contains_key(&(*tx_out_id, tx_out_index))
    }

    /// Get a UTXO if it exists
    pub fn get(&self, tx_out_id: &Hash, tx_out_index: u32) -> Option<&UTXO> {
        self.utxos.get(&(*tx_out_id, tx_out_index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UTXO> {
        self.utxos.values()
    }

    /// All UTXOs owned by `address`, in key order
    pub fn by_address<'a>(&'a self, address: &'a Address) -> impl Iterator<Item = &'a UTXO> + 'a {
        self.utxos.values().filter(move |utxo| &utxo.address == address)
    }

    /// Sum of amounts owned by `address`
    pub fn balance(&self, address: &Address) -> u64 {
        self.by_address(address)
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.amount))
    }

    /// Apply a transaction set, returning the resulting set
    ///
    /// Every output referenced by any input across `txs` is removed and one
    /// entry per output of every transaction is added. `self` is untouched.
    /// No validation happens here; callers validate first.
    pub fn apply_transactions(&self, txs: &[Transaction]) -> UTXOSet {
        let mut next = self.clone();

        for input in txs.iter().flat_map(|tx| tx.tx_ins.iter()) {
            next.utxos.remove(&input.outpoint());
        }

        for tx in txs {
            for (index, output) in tx.tx_outs.iter().enumerate() {
                let utxo = UTXO {
                    tx_out_id: tx.id,
                    tx_out_index: index as u32,
                    address: output.address.clone(),
                    amount: output.amount,
                };
                next.utxos.insert((tx.id, index as u32), utxo);
            }
        }

        next
    }

    /// Get total number of UTXOs
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

/// Free-function form of [`UTXOSet::apply_transactions`]
pub fn apply_transactions(txs: &[Transaction], utxo_set: &UTXOSet) -> UTXOSet {
    utxo_set.apply_transactions(txs)
}
