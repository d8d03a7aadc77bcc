//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur while agreeing on keys or sealing amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Key agreement produced a non-contributory secret")]
    NonContributory,

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Sealed block does not decode to an amount")]
    MalformedPlaintext,

    #[error("Value {0} exceeds the sealable range")]
    ValueOutOfRange(u128),
}
