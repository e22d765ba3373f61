//! Error classification shared by the validation layers

use std::fmt;

/// Broad class of a validation failure
///
/// Only `Reference` failures may succeed later: the referenced output can
/// appear once the ledger or mempool state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed block or transaction shape
    Structural,
    /// Referenced unspent output is missing
    Reference,
    /// Signature does not verify
    Crypto,
    /// Hash, index, timestamp or work mismatch
    Consensus,
    /// Double spend within the pool or a block
    Conflict,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Reference)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::Reference => "reference",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Consensus => "consensus",
            ErrorKind::Conflict => "conflict",
        };
        f.write_str(name)
    }
}
