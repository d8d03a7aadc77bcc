//! Key pairs and shared-secret derivation.
//!
//! Key pairs are X25519: the private scalar is 32 uniformly random bytes and
//! the public point is the scalar times the curve base point. Two parties
//! derive the same shared secret from their own private scalar and the
//! other's public point; the raw Diffie-Hellman output is run through
//! HKDF-SHA256 so the secret is uniformly distributed.

use std::fmt;

use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use auction_types::{PublicPoint, PUBLIC_POINT_SIZE};

use crate::error::CryptoError;

/// Size of a private scalar in bytes
pub const PRIVATE_SCALAR_SIZE: usize = 32;
/// Size of a derived shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

const SHARED_SECRET_SALT: &[u8] = b"SEALED_BID_X25519_V1";
const SHARED_SECRET_INFO: &[u8] = b"shared-secret";

/// Private half of a key pair.
///
/// The underlying scalar is zeroized when dropped.
#[derive(Clone)]
pub struct PrivateScalar(StaticSecret);

impl PrivateScalar {
    pub fn from_bytes(bytes: [u8; PRIVATE_SCALAR_SIZE]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_SCALAR_SIZE] {
        self.0.to_bytes()
    }

    /// Public point for this scalar. Deterministic.
    pub fn public_point(&self) -> PublicPoint {
        PublicPoint(PublicKey::from(&self.0).to_bytes())
    }

    /// Parse a private scalar from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let hex = hex.trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0u8; PRIVATE_SCALAR_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self::from_bytes(buff))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for PrivateScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateScalar(..)")
    }
}

/// A private scalar together with its public point.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: PrivateScalar,
    public: PublicPoint,
}

impl KeyPair {
    /// Generate a fresh key pair from a cryptographically secure RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; PRIVATE_SCALAR_SIZE];
        rng.fill_bytes(&mut bytes);
        Self::from_private(PrivateScalar::from_bytes(bytes))
    }

    pub fn from_private(private: PrivateScalar) -> Self {
        let public = private.public_point();
        Self { private, public }
    }

    pub fn private(&self) -> &PrivateScalar {
        &self.private
    }

    pub fn public(&self) -> PublicPoint {
        self.public
    }
}

/// Symmetric key agreed between two key pairs.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Derive the shared secret between `local` and the holder of `remote`.
///
/// `derive_shared_secret(a.private, b.public) == derive_shared_secret(b.private, a.public)`
/// for any two key pairs. Low-order remote points, which would force an
/// all-zero Diffie-Hellman output, are rejected.
pub fn derive_shared_secret(
    local: &PrivateScalar,
    remote: &PublicPoint,
) -> Result<SharedSecret, CryptoError> {
    let remote = PublicKey::from(remote.0);
    let dh = local.0.diffie_hellman(&remote);
    if !dh.was_contributory() {
        return Err(CryptoError::NonContributory);
    }

    let hk = Hkdf::<Sha256>::new(Some(SHARED_SECRET_SALT), dh.as_bytes());
    let mut okm = [0u8; SHARED_SECRET_SIZE];
    hk.expand(SHARED_SECRET_INFO, &mut okm)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

    Ok(SharedSecret(okm))
}

/// Parse a public point from a hexadecimal string.
pub fn public_point_from_hex(hex: &str) -> Result<PublicPoint, CryptoError> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut buff = [0u8; PUBLIC_POINT_SIZE];
    hex::decode_to_slice(hex, &mut buff)
        .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
    Ok(PublicPoint(buff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_shared_secret_symmetry() {
        let mut rng = OsRng;
        for _ in 0..64 {
            let a = KeyPair::generate(&mut rng);
            let b = KeyPair::generate(&mut rng);

            let ab = derive_shared_secret(a.private(), &b.public()).unwrap();
            let ba = derive_shared_secret(b.private(), &a.public()).unwrap();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_distinct_peers_get_distinct_secrets() {
        let mut rng = OsRng;
        let a = KeyPair::generate(&mut rng);
        let b = KeyPair::generate(&mut rng);
        let c = KeyPair::generate(&mut rng);

        let ab = derive_shared_secret(a.private(), &b.public()).unwrap();
        let ac = derive_shared_secret(a.private(), &c.public()).unwrap();
        assert_ne!(ab, ac);
    }

    #[test]
    fn test_public_point_is_deterministic() {
        let mut rng = OsRng;
        let pair = KeyPair::generate(&mut rng);
        let rebuilt = KeyPair::from_private(PrivateScalar::from_bytes(pair.private().to_bytes()));
        assert_eq!(pair.public(), rebuilt.public());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let mut rng = OsRng;
        let pair = KeyPair::generate(&mut rng);
        let result = derive_shared_secret(pair.private(), &PublicPoint([0u8; 32]));
        assert_eq!(result, Err(CryptoError::NonContributory));
    }

    #[test]
    fn test_hex_roundtrip() {
        let mut rng = OsRng;
        let pair = KeyPair::generate(&mut rng);

        let private = PrivateScalar::from_hex(&pair.private().to_hex()).unwrap();
        assert_eq!(private.public_point(), pair.public());

        let public = public_point_from_hex(&format!("0x{}", hex::encode(pair.public().0))).unwrap();
        assert_eq!(public, pair.public());

        assert!(matches!(
            PrivateScalar::from_hex("zz"),
            Err(CryptoError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut rng = OsRng;
        let pair = KeyPair::generate(&mut rng);
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains(&pair.private().to_hex()));
    }
}
