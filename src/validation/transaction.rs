//! Transaction structure, id derivation and input signing
//!
//! UTXO-based transactions signed with secp256k1 ECDSA over the transaction id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::COINBASE_AMOUNT;
use crate::crypto::{hash_bytes, Address, Hash, PrivateKey, Signature};
use crate::storage::UTXOSet;

use super::TxError;

/// Input signing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("Input {0} does not exist in the transaction")]
    InputOutOfRange(usize),
    #[error("Referenced output {tx_out_id}:{tx_out_index} not found, not signing")]
    ReferenceNotFound { tx_out_id: Hash, tx_out_index: u32 },
    #[error("Signing key does not own the referenced output (owner {owner})")]
    KeyMismatch { owner: Address },
}

/// A transaction input referencing a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    /// Id of the transaction containing the output
    pub tx_out_id: Hash,
    /// Index of the output in that transaction
    pub tx_out_index: u32,
    /// Signature over the spending transaction's id
    pub signature: Signature,
}

impl TxIn {
    /// Unsigned input spending `tx_out_id:tx_out_index`
    pub fn new(tx_out_id: Hash, tx_out_index: u32) -> Self {
        Self {
            tx_out_id,
            tx_out_index,
            signature: Signature::empty(),
        }
    }

    pub fn outpoint(&self) -> (Hash, u32) {
        (self.tx_out_id, self.tx_out_index)
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Recipient public key
    pub address: Address,
    /// Amount in base units
    pub amount: u64,
}

impl TxOut {
    pub fn new(address: Address, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Stated id; must equal `transaction_id(self)`
    pub id: Hash,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Create a transaction and derive its id. Inputs are left as given (usually unsigned).
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        let mut tx = Self {
            id: Hash::zero(),
            tx_ins,
            tx_outs,
        };
        tx.id = transaction_id(&tx);
        tx
    }

    /// Create the reward transaction for the block at `block_index`
    ///
    /// The block index is carried in the input's `tx_out_index`, so blocks
    /// past `u32::MAX` cannot have a coinbase.
    pub fn coinbase(address: Address, block_index: u64) -> Result<Self, TxError> {
        let tx_out_index = u32::try_from(block_index).map_err(|_| {
            TxError::BadStructure(format!("block index {block_index} does not fit a coinbase input"))
        })?;
        let tx_in = TxIn::new(Hash::zero(), tx_out_index);
        Ok(Self::new(vec![tx_in], vec![TxOut::new(address, COINBASE_AMOUNT)]))
    }

    /// Recompute the id from the current inputs and outputs
    pub fn compute_id(&self) -> Hash {
        transaction_id(self)
    }

    /// Total output value, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.tx_outs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }

    /// Serialize for hashing (signatures excluded)
    fn to_bytes_for_id(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&(self.tx_ins.len() as u32).to_le_bytes());
        for input in &self.tx_ins {
            bytes.extend_from_slice(input.tx_out_id.as_bytes());
            bytes.extend_from_slice(&input.tx_out_index.to_le_bytes());
        }

        bytes.extend_from_slice(&(self.tx_outs.len() as u32).to_le_bytes());
        for output in &self.tx_outs {
            let address = output.address.as_str().as_bytes();
            bytes.extend_from_slice(&(address.len() as u32).to_le_bytes());
            bytes.extend_from_slice(address);
            bytes.extend_from_slice(&output.amount.to_le_bytes());
        }

        bytes
    }
}

/// Derive a transaction id from its inputs' references and its outputs
pub fn transaction_id(tx: &Transaction) -> Hash {
    hash_bytes(&tx.to_bytes_for_id())
}

/// Sign input `input_index` of `tx`
///
/// Refuses to sign unless `key` owns the output the input references.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    key: &PrivateKey,
    utxo_set: &UTXOSet,
) -> Result<Signature, SignError> {
    let input = tx
        .tx_ins
        .get(input_index)
        .ok_or(SignError::InputOutOfRange(input_index))?;

    let referenced = utxo_set
        .get(&input.tx_out_id, input.tx_out_index)
        .ok_or(SignError::ReferenceNotFound {
            tx_out_id: input.tx_out_id,
            tx_out_index: input.tx_out_index,
        })?;

    if key.address() != referenced.address {
        return Err(SignError::KeyMismatch {
            owner: referenced.address.clone(),
        });
    }

    Ok(key.sign(&tx.id))
}

/// Verify input `input_index` against the address of the output it spends
pub fn verify_input(tx: &Transaction, input_index: usize, utxo_set: &UTXOSet) -> bool {
    let Some(input) = tx.tx_ins.get(input_index) else {
        return false;
    };
    match utxo_set.get(&input.tx_out_id, input.tx_out_index) {
        Some(utxo) => utxo.address.verify(&tx.id, &input.signature),
        None => false,
    }
}
