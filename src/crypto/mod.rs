//! Cryptography module - SHA-256 hashing, secp256k1 ECDSA keys and addresses

mod hash;
mod keys;

pub use hash::*;
pub use keys::*;
