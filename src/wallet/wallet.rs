//! Wallet implementation
//!
//! Holds the node's single signing key and builds spend transactions.
//! The wallet does NOT affect consensus: everything it produces is
//! validated again before it reaches the mempool.

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::crypto::{Address, Hash, PrivateKey, Signature, SignatureError};
use crate::mining::Mempool;
use crate::storage::{UTXOSet, UTXO};
use crate::validation::{sign_input, SignError, Transaction, TxIn, TxOut};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    #[error("Invalid receiver address: {0}")]
    InvalidAddress(String),
    #[error("Invalid key: {0}")]
    Key(#[from] SignatureError),
    #[error("Signing error: {0}")]
    Signing(#[from] SignError),
    #[error("Key file error: {0}")]
    Io(#[from] io::Error),
}

/// Sum of the amounts `address` owns in `utxo_set`
pub fn balance(address: &Address, utxo_set: &UTXOSet) -> u64 {
    utxo_set.balance(address)
}

/// A single-key wallet
#[derive(Clone)]
pub struct Wallet {
    key: PrivateKey,
    address: Address,
}

impl Wallet {
    /// Generate a wallet with a fresh random key
    pub fn generate() -> Self {
        Self::from_key(PrivateKey::generate())
    }

    pub fn from_key(key: PrivateKey) -> Self {
        let address = key.address();
        Self { key, address }
    }

    /// Load the hex private key at `path`, creating it if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let path = path.as_ref();
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let key = PrivateKey::from_hex(contents.trim())?;
            log::info!("Loaded wallet key from {}", path.display());
            return Ok(Self::from_key(key));
        }

        let wallet = Self::generate();
        wallet.save(path)?;
        log::info!("Created new wallet key at {}", path.display());
        Ok(wallet)
    }

    /// Write the private key as hex
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, self.key.to_hex())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn sign(&self, digest: &Hash) -> Signature {
        self.key.sign(digest)
    }

    pub fn balance(&self, utxo_set: &UTXOSet) -> u64 {
        balance(&self.address, utxo_set)
    }

    /// Outputs this wallet owns that no pending transaction spends yet
    fn spendable<'a>(&'a self, utxo_set: &'a UTXOSet, mempool: &'a Mempool) -> impl Iterator<Item = &'a UTXO> + 'a {
        utxo_set
            .by_address(&self.address)
            .filter(move |utxo| !mempool.is_spent(&utxo.tx_out_id, utxo.tx_out_index))
    }

    /// Build and sign a payment of `amount` to `receiver`
    ///
    /// Takes spendable outputs in ledger order until they cover `amount`;
    /// any leftover comes back to this wallet as a second output.
    pub fn create_transaction(
        &self,
        receiver: &Address,
        amount: u64,
        utxo_set: &UTXOSet,
        mempool: &Mempool,
    ) -> Result<Transaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }
        if !receiver.is_well_formed() {
            return Err(WalletError::InvalidAddress(receiver.as_str().to_string()));
        }

        let mut selected = Vec::new();
        let mut collected: u64 = 0;
        for utxo in self.spendable(utxo_set, mempool) {
            selected.push(TxIn::new(utxo.tx_out_id, utxo.tx_out_index));
            collected = collected.saturating_add(utxo.amount);
            if collected >= amount {
                break;
            }
        }

        if collected < amount {
            return Err(WalletError::InsufficientFunds {
                have: collected,
                need: amount,
            });
        }

        let mut outputs = vec![TxOut::new(receiver.clone(), amount)];
        let leftover = collected - amount;
        if leftover > 0 {
            outputs.push(TxOut::new(self.address.clone(), leftover));
        }

        let mut tx = Transaction::new(selected, outputs);
        for index in 0..tx.tx_ins.len() {
            tx.tx_ins[index].signature = sign_input(&tx, index, &self.key, utxo_set)?;
        }

        Ok(tx)
    }
}
