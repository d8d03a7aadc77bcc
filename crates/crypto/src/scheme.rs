//! Pluggable sealing scheme.
//!
//! Callers that should not depend on a concrete primitive hold a
//! `dyn SealingScheme`. [`X25519HkdfScheme`] is the only implementation.

use rand::rngs::OsRng;

use auction_types::{Amount, Nonce, PublicPoint, SealedBlock, SealedValue};

use crate::error::CryptoError;
use crate::keys::{self, KeyPair, PrivateScalar, SharedSecret};
use crate::seal;

/// Key agreement plus fixed-size sealing of one amount.
pub trait SealingScheme: Send + Sync {
    /// Fresh key pair from the operating system RNG.
    fn generate_key_pair(&self) -> KeyPair;

    /// Symmetric in its arguments across two key pairs.
    fn derive_shared_secret(
        &self,
        local: &PrivateScalar,
        remote: &PublicPoint,
    ) -> Result<SharedSecret, CryptoError>;

    fn seal(&self, value: Amount, secret: &SharedSecret, nonce: &Nonce) -> Result<SealedBlock, CryptoError>;

    fn unseal(&self, sealed: &SealedBlock, secret: &SharedSecret, nonce: &Nonce) -> Result<Amount, CryptoError>;

    fn generate_nonce(&self) -> Nonce;

    /// Seal `value` to `recipient` under an ephemeral key pair.
    fn seal_for(&self, value: Amount, recipient: &PublicPoint) -> Result<SealedValue, CryptoError> {
        let ephemeral = self.generate_key_pair();
        let secret = self.derive_shared_secret(ephemeral.private(), recipient)?;
        let nonce = self.generate_nonce();
        Ok(SealedValue {
            ciphertext: self.seal(value, &secret, &nonce)?,
            sender_public: ephemeral.public(),
            nonce,
        })
    }

    /// Open a value sealed to the holder of `recipient`.
    fn open(&self, sealed: &SealedValue, recipient: &PrivateScalar) -> Result<Amount, CryptoError> {
        let secret = self.derive_shared_secret(recipient, &sealed.sender_public)?;
        self.unseal(&sealed.ciphertext, &secret, &sealed.nonce)
    }
}

/// X25519 key agreement with an HKDF-SHA256 keystream.
#[derive(Debug, Default, Clone, Copy)]
pub struct X25519HkdfScheme;

impl SealingScheme for X25519HkdfScheme {
    fn generate_key_pair(&self) -> KeyPair {
        KeyPair::generate(&mut OsRng)
    }

    fn derive_shared_secret(
        &self,
        local: &PrivateScalar,
        remote: &PublicPoint,
    ) -> Result<SharedSecret, CryptoError> {
        keys::derive_shared_secret(local, remote)
    }

    fn seal(&self, value: Amount, secret: &SharedSecret, nonce: &Nonce) -> Result<SealedBlock, CryptoError> {
        seal::seal(value, secret, nonce)
    }

    fn unseal(&self, sealed: &SealedBlock, secret: &SharedSecret, nonce: &Nonce) -> Result<Amount, CryptoError> {
        seal::unseal(sealed, secret, nonce)
    }

    fn generate_nonce(&self) -> Nonce {
        seal::generate_nonce(&mut OsRng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_object_roundtrip() {
        let scheme: Box<dyn SealingScheme> = Box::new(X25519HkdfScheme);
        let evaluator = scheme.generate_key_pair();

        let sealed = scheme.seal_for(900, &evaluator.public()).unwrap();
        assert_eq!(scheme.open(&sealed, evaluator.private()).unwrap(), 900);
    }

    #[test]
    fn test_scheme_interoperates_with_free_functions() {
        let scheme = X25519HkdfScheme;
        let evaluator = scheme.generate_key_pair();

        let sealed = seal::seal_for_recipient(77, &evaluator.public(), &mut OsRng).unwrap();
        assert_eq!(scheme.open(&sealed, evaluator.private()).unwrap(), 77);
    }

    #[test]
    fn test_scheme_nonces_are_fresh() {
        let scheme = X25519HkdfScheme;
        assert_ne!(scheme.generate_nonce(), scheme.generate_nonce());
    }
}
