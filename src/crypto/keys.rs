//! ECDSA keys and addresses
//!
//! Uses the secp256k1 curve. An address is the hex encoding of the
//! uncompressed SEC1 public key (`04` || X || Y, 130 hex chars).

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use super::Hash;

/// Length of a hex-encoded uncompressed public key
pub const ADDRESS_HEX_LEN: usize = 130;

/// Signature errors
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature encoding")]
    InvalidEncoding,
}

/// secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Create from 32 bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| SignatureError::InvalidPrivateKey)
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| SignatureError::InvalidPrivateKey)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidPrivateKey)?;
        Self::from_bytes(&arr)
    }

    /// Export to bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Address owned by this key
    pub fn address(&self) -> Address {
        let point = self.0.verifying_key().to_encoded_point(false);
        Address(hex::encode(point.as_bytes()))
    }

    /// Sign a digest (the transaction id)
    pub fn sign(&self, message: &Hash) -> Signature {
        let signature: EcdsaSignature = self.0.sign(message.as_bytes());
        Signature(signature.to_bytes().to_vec())
    }
}

/// Hex-encoded uncompressed public key identifying an output owner
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 130 hex chars starting with `04`
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == ADDRESS_HEX_LEN
            && self.0.starts_with("04")
            && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Verify a signature over `message` using this address as the public key
    pub fn verify(&self, message: &Hash, signature: &Signature) -> bool {
        let Ok(key_bytes) = hex::decode(&self.0) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
            return false;
        };
        let Ok(sig) = EcdsaSignature::from_slice(&signature.0) else {
            return false;
        };
        verifying_key.verify(message.as_bytes(), &sig).is_ok()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact (r || s) ECDSA signature; empty on coinbase inputs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn empty() -> Self {
        Signature(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(Signature)
            .map_err(|_| serde::de::Error::custom(SignatureError::InvalidEncoding))
    }
}
