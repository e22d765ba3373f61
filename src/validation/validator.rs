//! Transaction validation rules
//!
//! Pure functions; the first failing check decides the reported error.

use std::collections::HashSet;
use thiserror::Error;

use super::{verify_input, Transaction};
use crate::constants::COINBASE_AMOUNT;
use crate::crypto::Hash;
use crate::error::ErrorKind;
use crate::storage::UTXOSet;

/// Transaction validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxError {
    #[error("Malformed transaction: {0}")]
    BadStructure(String),
    #[error("Transaction id {stated} does not match computed id {computed}")]
    BadId { stated: Hash, computed: Hash },
    #[error("Input {tx_out_id}:{tx_out_index} does not reference an unspent output")]
    UnknownInput { tx_out_id: Hash, tx_out_index: u32 },
    #[error("Signature of input {index} does not verify")]
    BadSignature { index: usize },
    #[error("Inputs total {inputs} but outputs total {outputs}")]
    AmountMismatch { inputs: u64, outputs: u64 },
    #[error("Output {tx_out_id}:{tx_out_index} is spent more than once in the block")]
    DuplicateInput { tx_out_id: Hash, tx_out_index: u32 },
    #[error("Block carries no transactions, a coinbase is required")]
    MissingCoinbase,
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::BadStructure(_) | TxError::MissingCoinbase => ErrorKind::Structural,
            TxError::BadId { .. } | TxError::AmountMismatch { .. } => ErrorKind::Consensus,
            TxError::UnknownInput { .. } => ErrorKind::Reference,
            TxError::BadSignature { .. } => ErrorKind::Crypto,
            TxError::DuplicateInput { .. } => ErrorKind::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Shape checks shared by regular and coinbase transactions
fn check_structure(tx: &Transaction) -> Result<(), TxError> {
    if tx.tx_ins.is_empty() {
        return Err(TxError::BadStructure("transaction has no inputs".into()));
    }

    for (index, output) in tx.tx_outs.iter().enumerate() {
        if !output.address.is_well_formed() {
            return Err(TxError::BadStructure(format!(
                "output {index} address is not a 130-char uncompressed public key"
            )));
        }
    }

    if tx.total_output_value().is_none() {
        return Err(TxError::BadStructure("output amounts overflow".into()));
    }

    Ok(())
}

fn check_id(tx: &Transaction) -> Result<(), TxError> {
    let computed = tx.compute_id();
    if computed != tx.id {
        return Err(TxError::BadId {
            stated: tx.id,
            computed,
        });
    }
    Ok(())
}

/// Validate a regular (non-coinbase) transaction against `utxo_set`
pub fn validate_transaction(tx: &Transaction, utxo_set: &UTXOSet) -> Result<(), TxError> {
    check_structure(tx)?;

    let mut seen = HashSet::new();
    for input in &tx.tx_ins {
        if !seen.insert(input.outpoint()) {
            return Err(TxError::BadStructure(format!(
                "input {}:{} listed twice",
                input.tx_out_id, input.tx_out_index
            )));
        }
    }

    check_id(tx)?;

    let mut inputs: u64 = 0;
    for input in &tx.tx_ins {
        let utxo = utxo_set
            .get(&input.tx_out_id, input.tx_out_index)
            .ok_or(TxError::UnknownInput {
                tx_out_id: input.tx_out_id,
                tx_out_index: input.tx_out_index,
            })?;
        inputs = inputs
            .checked_add(utxo.amount)
            .ok_or_else(|| TxError::BadStructure("input amounts overflow".into()))?;
    }

    for index in 0..tx.tx_ins.len() {
        if !verify_input(tx, index, utxo_set) {
            return Err(TxError::BadSignature { index });
        }
    }

    // check_structure already rejected overflowing outputs
    let outputs = tx.total_output_value().unwrap_or(u64::MAX);
    if inputs != outputs {
        return Err(TxError::AmountMismatch { inputs, outputs });
    }

    Ok(())
}

/// Validate the reward transaction of the block at `block_index`
pub fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<(), TxError> {
    check_structure(tx)?;
    check_id(tx)?;

    if tx.tx_ins.len() != 1 {
        return Err(TxError::BadStructure("coinbase must have exactly one input".into()));
    }
    let input = &tx.tx_ins[0];
    if !input.tx_out_id.is_zero() {
        return Err(TxError::BadStructure("coinbase input must not reference an output".into()));
    }
    if u64::from(input.tx_out_index) != block_index {
        return Err(TxError::BadStructure(format!(
            "coinbase txOutIndex {} does not match block index {}",
            input.tx_out_index, block_index
        )));
    }
    if tx.tx_outs.len() != 1 {
        return Err(TxError::BadStructure("coinbase must have exactly one output".into()));
    }
    if tx.tx_outs[0].amount != COINBASE_AMOUNT {
        return Err(TxError::BadStructure(format!(
            "coinbase pays {} instead of {}",
            tx.tx_outs[0].amount, COINBASE_AMOUNT
        )));
    }

    Ok(())
}

/// Validate the full transaction list of the block at `block_index`
///
/// The first transaction must be the coinbase; no output may be referenced
/// twice anywhere in the block; every other transaction must validate
/// against `utxo_set` (the state before the block).
pub fn validate_block_transactions(
    txs: &[Transaction],
    utxo_set: &UTXOSet,
    block_index: u64,
) -> Result<(), TxError> {
    let coinbase = txs.first().ok_or(TxError::MissingCoinbase)?;
    validate_coinbase(coinbase, block_index)?;

    let mut seen = HashSet::new();
    for input in txs.iter().flat_map(|tx| tx.tx_ins.iter()) {
        if !seen.insert(input.outpoint()) {
            return Err(TxError::DuplicateInput {
                tx_out_id: input.tx_out_id,
                tx_out_index: input.tx_out_index,
            });
        }
    }

    for tx in &txs[1..] {
        validate_transaction(tx, utxo_set)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_bytes, Address, PrivateKey};
    use crate::validation::{sign_input, TxIn, TxOut};

    struct Fixture {
        key: PrivateKey,
        coinbase: Transaction,
        utxos: UTXOSet,
    }

    fn fixture() -> Fixture {
        let key = PrivateKey::generate();
        let coinbase = Transaction::coinbase(key.address(), 0).unwrap();
        let utxos = UTXOSet::new().apply_transactions(std::slice::from_ref(&coinbase));
        Fixture { key, coinbase, utxos }
    }

    fn signed_spend(f: &Fixture, outs: Vec<TxOut>) -> Transaction {
        let mut tx = Transaction::new(vec![TxIn::new(f.coinbase.id, 0)], outs);
        tx.tx_ins[0].signature = sign_input(&tx, 0, &f.key, &f.utxos).unwrap();
        tx
    }

    #[test]
    fn test_valid_spend() {
        let f = fixture();
        let to = PrivateKey::generate().address();
        let tx = signed_spend(&f, vec![TxOut::new(to, 20), TxOut::new(f.key.address(), 30)]);

        assert_eq!(validate_transaction(&tx, &f.utxos), Ok(()));
    }

    #[test]
    fn test_bad_address_is_structural() {
        let f = fixture();
        let tx = signed_spend(&f, vec![TxOut::new(Address::new("04abc"), 50)]);

        let err = validate_transaction(&tx, &f.utxos).unwrap_err();
        assert!(matches!(err, TxError::BadStructure(_)));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_no_inputs_rejected() {
        let f = fixture();
        let tx = Transaction::new(vec![], vec![]);
        assert!(matches!(validate_transaction(&tx, &f.utxos), Err(TxError::BadStructure(_))));
    }

    #[test]
    fn test_repeated_input_rejected() {
        let f = fixture();
        let mut tx = Transaction::new(
            vec![TxIn::new(f.coinbase.id, 0), TxIn::new(f.coinbase.id, 0)],
            vec![TxOut::new(f.key.address(), 100)],
        );
        for i in 0..2 {
            tx.tx_ins[i].signature = sign_input(&tx, i, &f.key, &f.utxos).unwrap();
        }

        assert!(matches!(validate_transaction(&tx, &f.utxos), Err(TxError::BadStructure(_))));
    }

    #[test]
    fn test_tampered_id() {
        let f = fixture();
        let mut tx = signed_spend(&f, vec![TxOut::new(f.key.address(), 50)]);
        tx.tx_outs[0].amount = 49;

        assert!(matches!(validate_transaction(&tx, &f.utxos), Err(TxError::BadId { .. })));
    }

    #[test]
    fn test_unknown_input_is_retryable() {
        let f = fixture();
        let tx = Transaction::new(
            vec![TxIn::new(hash_bytes(b"missing"), 0)],
            vec![TxOut::new(f.key.address(), 50)],
        );

        let err = validate_transaction(&tx, &f.utxos).unwrap_err();
        assert!(matches!(err, TxError::UnknownInput { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_bad_signature() {
        let f = fixture();
        let mut tx = signed_spend(&f, vec![TxOut::new(f.key.address(), 50)]);
        tx.tx_ins[0].signature = PrivateKey::generate().sign(&tx.id);

        let err = validate_transaction(&tx, &f.utxos).unwrap_err();
        assert_eq!(err, TxError::BadSignature { index: 0 });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_amount_mismatch() {
        let f = fixture();
        let tx = signed_spend(&f, vec![TxOut::new(f.key.address(), 51)]);

        assert_eq!(
            validate_transaction(&tx, &f.utxos),
            Err(TxError::AmountMismatch { inputs: 50, outputs: 51 })
        );
    }

    #[test]
    fn test_coinbase_rules() {
        let address = PrivateKey::generate().address();

        assert_eq!(validate_coinbase(&Transaction::coinbase(address.clone(), 4).unwrap(), 4), Ok(()));
        assert!(matches!(
            validate_coinbase(&Transaction::coinbase(address.clone(), 3).unwrap(), 4),
            Err(TxError::BadStructure(_))
        ));

        let greedy = Transaction::new(
            vec![TxIn::new(Hash::zero(), 4)],
            vec![TxOut::new(address.clone(), COINBASE_AMOUNT + 1)],
        );
        assert!(matches!(validate_coinbase(&greedy, 4), Err(TxError::BadStructure(_))));

        let stealing = Transaction::new(
            vec![TxIn::new(hash_bytes(b"someone"), 4)],
            vec![TxOut::new(address, COINBASE_AMOUNT)],
        );
        assert!(matches!(validate_coinbase(&stealing, 4), Err(TxError::BadStructure(_))));
    }

    #[test]
    fn test_block_requires_coinbase_first() {
        let f = fixture();
        let spend = signed_spend(&f, vec![TxOut::new(f.key.address(), 50)]);

        assert_eq!(validate_block_transactions(&[], &f.utxos, 1), Err(TxError::MissingCoinbase));
        assert!(validate_block_transactions(&[spend.clone()], &f.utxos, 1).is_err());

        let coinbase = Transaction::coinbase(f.key.address(), 1).unwrap();
        assert_eq!(validate_block_transactions(&[coinbase, spend], &f.utxos, 1), Ok(()));
    }

    #[test]
    fn test_block_double_spend_across_transactions() {
        let f = fixture();
        let first = signed_spend(&f, vec![TxOut::new(f.key.address(), 50)]);
        let second = signed_spend(&f, vec![TxOut::new(PrivateKey::generate().address(), 50)]);
        let coinbase = Transaction::coinbase(f.key.address(), 1).unwrap();

        let err = validate_block_transactions(&[coinbase, first, second], &f.utxos, 1).unwrap_err();
        assert!(matches!(err, TxError::DuplicateInput { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
