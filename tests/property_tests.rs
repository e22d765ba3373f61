//! Property-based and adversarial tests for the Curra ledger
//!
//! These tests verify invariants hold under random inputs and attack scenarios.

use curra_core::consensus::{calculate_hash, is_block_valid, total_work, unix_now, Block, BlockError};
use curra_core::crypto::{hash_bytes, Address, Hash, PrivateKey};
use curra_core::mining::Mempool;
use curra_core::node::{create_genesis_block, ChainEngine, NoopEvents};
use curra_core::storage::UTXOSet;
use curra_core::validation::{
    sign_input, transaction_id, validate_block_transactions, validate_transaction, SignError, Transaction,
    TxError, TxIn, TxOut,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// One output of `amount` per entry, all owned by `key`
fn fund(key: &PrivateKey, amounts: &[u64]) -> (Vec<Transaction>, UTXOSet) {
    let sources: Vec<Transaction> = amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| {
            let mut tx = Transaction::coinbase(key.address(), i as u64).unwrap();
            tx.tx_outs[0].amount = amount;
            tx.id = tx.compute_id();
            tx
        })
        .collect();
    let utxos = UTXOSet::new().apply_transactions(&sources);
    (sources, utxos)
}

/// Spend output 0 of `source`, splitting it over `shares` and keeping the rest
fn spend(key: &PrivateKey, source: &Transaction, utxos: &UTXOSet, shares: &[u64]) -> Transaction {
    let total = source.tx_outs[0].amount;
    let mut outs: Vec<TxOut> = shares
        .iter()
        .map(|&amount| TxOut::new(PrivateKey::generate().address(), amount))
        .collect();
    let paid: u64 = shares.iter().sum();
    outs.push(TxOut::new(key.address(), total - paid));

    let mut tx = Transaction::new(vec![TxIn::new(source.id, 0)], outs);
    tx.tx_ins[0].signature = sign_input(&tx, 0, key, utxos).unwrap();
    tx
}

fn engine() -> ChainEngine {
    ChainEngine::new(Box::new(NoopEvents)).unwrap()
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Block hash is deterministic
    #[test]
    fn prop_block_hash_deterministic(
        index in 0u64..1_000_000u64,
        timestamp in 0u64..u64::MAX,
        difficulty in 0u32..256u32,
        nonce in 0u64..u64::MAX
    ) {
        let txs = vec![Transaction::coinbase(Address::new("04"), index).unwrap()];
        let prev = hash_bytes(&index.to_le_bytes());

        prop_assert_eq!(
            calculate_hash(index, &prev, timestamp, &txs, difficulty, nonce),
            calculate_hash(index, &prev, timestamp, &txs, difficulty, nonce)
        );
    }

    /// Different nonces produce different hashes
    #[test]
    fn prop_different_nonce_different_hash(nonce1 in 0u64..u64::MAX / 2) {
        let txs = vec![Transaction::coinbase(Address::new("04"), 1).unwrap()];
        let nonce2 = nonce1.wrapping_add(1);

        prop_assert_ne!(
            calculate_hash(1, &Hash::zero(), 0, &txs, 0, nonce1),
            calculate_hash(1, &Hash::zero(), 0, &txs, 0, nonce2)
        );
    }

    /// Every accepted transaction's stored id equals its recomputed id,
    /// also after a JSON round trip
    #[test]
    fn prop_accepted_transaction_id_roundtrip(
        total in 1u64..1_000_000u64,
        shares in prop::collection::vec(1u64..1000u64, 0..4)
    ) {
        prop_assume!(shares.iter().sum::<u64>() <= total);
        let key = PrivateKey::generate();
        let (sources, utxos) = fund(&key, &[total]);
        let tx = spend(&key, &sources[0], &utxos, &shares);

        prop_assert_eq!(validate_transaction(&tx, &utxos), Ok(()));
        prop_assert_eq!(transaction_id(&tx), tx.id);

        let json = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(transaction_id(&decoded), tx.id);
    }

    /// Applying the same transactions to two equal sets gives equal results
    #[test]
    fn prop_apply_transactions_idempotent(
        amounts in prop::collection::vec(1u64..1000u64, 1..5),
        share in 0u64..1000u64
    ) {
        let key = PrivateKey::generate();
        let (sources, utxos) = fund(&key, &amounts);
        let share = share.min(amounts[0]);
        let txs = vec![spend(&key, &sources[0], &utxos, &[share])];

        let copy = utxos.clone();
        let a = utxos.apply_transactions(&txs);
        let b = copy.apply_transactions(&txs);

        prop_assert_eq!(&a, &b);
        // The prior state is untouched
        prop_assert!(utxos.contains(&sources[0].id, 0));
        prop_assert!(!a.contains(&sources[0].id, 0));
    }

    /// No two pooled transactions ever share an input
    #[test]
    fn prop_mempool_never_shares_inputs(
        picks in prop::collection::vec(0usize..3usize, 1..8)
    ) {
        let key = PrivateKey::generate();
        let (sources, utxos) = fund(&key, &[10, 20, 30]);
        let mut pool = Mempool::new();

        for (round, pick) in picks.into_iter().enumerate() {
            let shares = [round as u64 % 5 + 1];
            let _ = pool.admit(spend(&key, &sources[pick], &utxos, &shares), &utxos);

            let mut seen = HashSet::new();
            for input in pool.transactions().iter().flat_map(|tx| tx.tx_ins.iter()) {
                prop_assert!(seen.insert(input.outpoint()));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Replaying the same chain always yields the same UTXO set
    #[test]
    fn prop_chain_replay_deterministic(blocks in 1usize..5usize) {
        let mut source = engine();
        let miner = PrivateKey::generate().address();
        for _ in 0..blocks {
            source.create_block(&miner).unwrap();
        }

        let verifier = engine();
        let first = verifier.evaluate_candidate_chain(source.chain()).unwrap();
        let second = verifier.evaluate_candidate_chain(source.chain()).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, source.utxos());
        prop_assert_eq!(first.balance(&miner), 50 * blocks as u64);
    }

    /// Appending a block always adds work
    #[test]
    fn prop_total_work_grows(blocks in 1usize..5usize) {
        let mut engine = engine();
        let miner = PrivateKey::generate().address();
        for _ in 0..blocks {
            let before = total_work(engine.chain());
            engine.create_block(&miner).unwrap();
            prop_assert!(total_work(engine.chain()) > before);
        }
    }
}

// ============================================================================
// ADVERSARIAL TESTS
// ============================================================================

/// Test: Double-spend detection
///
/// Attacker tries to spend the same UTXO twice in one block.
#[test]
fn test_double_spend_in_block_rejected() {
    let key = PrivateKey::generate();
    let (sources, utxos) = fund(&key, &[50]);
    let first = spend(&key, &sources[0], &utxos, &[10]);
    let second = spend(&key, &sources[0], &utxos, &[20]);

    // Each is fine on its own
    assert_eq!(validate_transaction(&first, &utxos), Ok(()));
    assert_eq!(validate_transaction(&second, &utxos), Ok(()));

    let coinbase = Transaction::coinbase(key.address(), 1).unwrap();
    let result = validate_block_transactions(&[coinbase, first, second], &utxos, 1);

    assert!(matches!(result, Err(TxError::DuplicateInput { .. })));
}

/// Test: Invalid block reward rejected
///
/// Attacker tries to claim more reward than allowed.
#[test]
fn test_excess_reward_rejected() {
    let mut coinbase = Transaction::coinbase(PrivateKey::generate().address(), 1).unwrap();
    coinbase.tx_outs[0].amount += 1;
    coinbase.id = coinbase.compute_id();

    let result = validate_block_transactions(&[coinbase], &UTXOSet::new(), 1);
    assert!(matches!(result, Err(TxError::BadStructure(_))));
}

/// Test: Signing on behalf of another owner
///
/// A key that does not own the referenced output must not produce a signature.
#[test]
fn test_foreign_key_cannot_sign() {
    let owner = PrivateKey::generate();
    let thief = PrivateKey::generate();
    let (sources, utxos) = fund(&owner, &[50]);
    let tx = Transaction::new(
        vec![TxIn::new(sources[0].id, 0)],
        vec![TxOut::new(thief.address(), 50)],
    );

    assert!(matches!(
        sign_input(&tx, 0, &thief, &utxos),
        Err(SignError::KeyMismatch { .. })
    ));
}

/// Test: Redirected payment
///
/// Attacker rewrites the outputs of a signed transaction and fixes the id.
#[test]
fn test_redirected_outputs_rejected() {
    let key = PrivateKey::generate();
    let (sources, utxos) = fund(&key, &[50]);
    let mut tx = spend(&key, &sources[0], &utxos, &[20]);

    tx.tx_outs[0].address = PrivateKey::generate().address();
    assert!(matches!(validate_transaction(&tx, &utxos), Err(TxError::BadId { .. })));

    tx.id = tx.compute_id();
    assert_eq!(
        validate_transaction(&tx, &utxos),
        Err(TxError::BadSignature { index: 0 })
    );
}

/// Test: Future timestamp
///
/// A block stamped more than a minute ahead of the local clock is rejected.
#[test]
fn test_future_block_rejected() {
    let genesis = create_genesis_block();
    let coinbase = Transaction::coinbase(PrivateKey::generate().address(), 1).unwrap();
    let block = Block::new(1, genesis.hash, unix_now() + 3600, vec![coinbase], 0, 0);

    assert!(matches!(
        is_block_valid(&block, &genesis, unix_now()),
        Err(BlockError::BadTimestamp { .. })
    ));
}

/// Test: Genesis determinism
///
/// Genesis block must be reproducible byte-for-byte.
#[test]
fn test_genesis_determinism() {
    let genesis1 = create_genesis_block();
    let genesis2 = create_genesis_block();

    assert_eq!(genesis1.hash, genesis2.hash);
    assert_eq!(
        serde_json::to_vec(&genesis1).unwrap(),
        serde_json::to_vec(&genesis2).unwrap()
    );
}
