//! Fixed-size sealing of a single amount.
//!
//! ```text
//! block     = 0x00 * 24 || amount (u64, big-endian)
//! keystream = HKDF-SHA256(salt = nonce, ikm = shared_secret).expand("keystream", 32)
//! sealed    = block XOR keystream
//! ```
//!
//! Every `u64` fits the block, so sealing an amount never saturates or
//! truncates. The zero prefix doubles as a check on unsealing: under a wrong
//! secret the prefix is random and the block is rejected.

use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use auction_types::{Amount, Nonce, PublicPoint, SealedBlock, SealedValue, NONCE_SIZE, SEALED_BLOCK_SIZE};

use crate::error::CryptoError;
use crate::keys::{derive_shared_secret, KeyPair, PrivateScalar, SharedSecret};

const KEYSTREAM_INFO: &[u8] = b"keystream";
const AMOUNT_OFFSET: usize = SEALED_BLOCK_SIZE - std::mem::size_of::<Amount>();

/// Draw a fresh nonce. Never reuse one under the same shared secret.
pub fn generate_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> Nonce {
    let mut bytes = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut bytes);
    Nonce(bytes)
}

fn keystream(secret: &SharedSecret, nonce: &Nonce) -> Result<[u8; SEALED_BLOCK_SIZE], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(&nonce.0), secret.as_bytes());
    let mut stream = [0u8; SEALED_BLOCK_SIZE];
    hk.expand(KEYSTREAM_INFO, &mut stream)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(stream)
}

fn xor_block(
    block: &[u8; SEALED_BLOCK_SIZE],
    stream: &[u8; SEALED_BLOCK_SIZE],
) -> [u8; SEALED_BLOCK_SIZE] {
    let mut out = [0u8; SEALED_BLOCK_SIZE];
    for (o, (b, k)) in out.iter_mut().zip(block.iter().zip(stream.iter())) {
        *o = b ^ k;
    }
    out
}

/// Seal an arbitrary block. Deterministic in its inputs.
pub fn seal_block(
    block: &[u8; SEALED_BLOCK_SIZE],
    secret: &SharedSecret,
    nonce: &Nonce,
) -> Result<SealedBlock, CryptoError> {
    let stream = keystream(secret, nonce)?;
    Ok(SealedBlock(xor_block(block, &stream)))
}

/// Recover the raw block sealed under `secret` and `nonce`.
///
/// Under any other secret the output is indistinguishable from random bytes.
pub fn unseal_block(
    sealed: &SealedBlock,
    secret: &SharedSecret,
    nonce: &Nonce,
) -> Result<[u8; SEALED_BLOCK_SIZE], CryptoError> {
    let stream = keystream(secret, nonce)?;
    Ok(xor_block(&sealed.0, &stream))
}

/// Seal an amount.
pub fn seal(value: Amount, secret: &SharedSecret, nonce: &Nonce) -> Result<SealedBlock, CryptoError> {
    let mut block = [0u8; SEALED_BLOCK_SIZE];
    block[AMOUNT_OFFSET..].copy_from_slice(&value.to_be_bytes());
    seal_block(&block, secret, nonce)
}

/// Seal a value that may not fit an [`Amount`].
///
/// Values above `Amount::MAX` are rejected rather than clamped.
pub fn seal_u128(value: u128, secret: &SharedSecret, nonce: &Nonce) -> Result<SealedBlock, CryptoError> {
    let value = Amount::try_from(value).map_err(|_| CryptoError::ValueOutOfRange(value))?;
    seal(value, secret, nonce)
}

/// Unseal an amount. Exact inverse of [`seal`] for the same secret and nonce.
pub fn unseal(sealed: &SealedBlock, secret: &SharedSecret, nonce: &Nonce) -> Result<Amount, CryptoError> {
    let block = unseal_block(sealed, secret, nonce)?;
    if block[..AMOUNT_OFFSET].iter().any(|b| *b != 0) {
        return Err(CryptoError::MalformedPlaintext);
    }
    let mut value = [0u8; std::mem::size_of::<Amount>()];
    value.copy_from_slice(&block[AMOUNT_OFFSET..]);
    Ok(Amount::from_be_bytes(value))
}

/// Seal `value` so only the holder of `recipient`'s private scalar can open it.
///
/// Uses a one-shot ephemeral key pair; its private scalar is dropped before
/// returning.
pub fn seal_for_recipient<R: RngCore + CryptoRng>(
    value: Amount,
    recipient: &PublicPoint,
    rng: &mut R,
) -> Result<SealedValue, CryptoError> {
    let ephemeral = KeyPair::generate(rng);
    let secret = derive_shared_secret(ephemeral.private(), recipient)?;
    let nonce = generate_nonce(rng);
    let ciphertext = seal(value, &secret, &nonce)?;

    Ok(SealedValue {
        ciphertext,
        sender_public: ephemeral.public(),
        nonce,
    })
}

/// Open a sealed value with the recipient's private scalar.
pub fn open_sealed(sealed: &SealedValue, recipient: &PrivateScalar) -> Result<Amount, CryptoError> {
    let secret = derive_shared_secret(recipient, &sealed.sender_public)?;
    unseal(&sealed.ciphertext, &secret, &sealed.nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn random_secret(rng: &mut OsRng) -> SharedSecret {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        SharedSecret::from_bytes(bytes)
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);

        for value in [0, 1, 500_000_000, u64::MAX - 1, u64::MAX, rng.next_u64()] {
            let nonce = generate_nonce(&mut rng);
            let sealed = seal(value, &secret, &nonce).unwrap();
            assert_eq!(unseal(&sealed, &secret, &nonce).unwrap(), value);
        }
    }

    #[test]
    fn test_seal_u128_rejects_wide_values() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);
        let nonce = generate_nonce(&mut rng);

        let sealed = seal_u128(u64::MAX as u128, &secret, &nonce).unwrap();
        assert_eq!(unseal(&sealed, &secret, &nonce).unwrap(), u64::MAX);

        let wide = u64::MAX as u128 + 1;
        assert_eq!(
            seal_u128(wide, &secret, &nonce),
            Err(CryptoError::ValueOutOfRange(wide))
        );
    }

    #[test]
    fn test_seal_is_deterministic() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);
        let nonce = generate_nonce(&mut rng);

        assert_eq!(
            seal(42, &secret, &nonce).unwrap(),
            seal(42, &secret, &nonce).unwrap()
        );
    }

    #[test]
    fn test_fresh_nonce_changes_ciphertext() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);

        let a = seal(42, &secret, &generate_nonce(&mut rng)).unwrap();
        let b = seal(42, &secret, &generate_nonce(&mut rng)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_does_not_reveal_value() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);
        let nonce = generate_nonce(&mut rng);
        let value = 750_000_000u64;
        let sealed = seal(value, &secret, &nonce).unwrap();

        let mut ones = [0u32; 8 * SEALED_BLOCK_SIZE];
        let samples = 512;
        for _ in 0..samples {
            let wrong = random_secret(&mut rng);
            assert_ne!(unseal(&sealed, &wrong, &nonce).ok(), Some(value));

            let block = unseal_block(&sealed, &wrong, &nonce).unwrap();
            assert_ne!(block[AMOUNT_OFFSET..], value.to_be_bytes());
            for (i, byte) in block.iter().enumerate() {
                for bit in 0..8usize {
                    ones[i * 8 + bit] += u32::from((byte >> bit) & 1);
                }
            }
        }

        // Every output bit should be set about half the time.
        for count in ones {
            assert!((160..=352).contains(&count), "biased bit count {count}");
        }
    }

    #[test]
    fn test_wrong_nonce_rejected() {
        let mut rng = OsRng;
        let secret = random_secret(&mut rng);
        let sealed = seal(7, &secret, &generate_nonce(&mut rng)).unwrap();

        let result = unseal(&sealed, &secret, &generate_nonce(&mut rng));
        assert_eq!(result, Err(CryptoError::MalformedPlaintext));
    }

    #[test]
    fn test_seal_for_recipient_roundtrip() {
        let mut rng = OsRng;
        let recipient = KeyPair::generate(&mut rng);
        let outsider = KeyPair::generate(&mut rng);

        let sealed = seal_for_recipient(1_234, &recipient.public(), &mut rng).unwrap();
        assert_ne!(sealed.sender_public, recipient.public());
        assert_eq!(open_sealed(&sealed, recipient.private()).unwrap(), 1_234);
        assert!(open_sealed(&sealed, outsider.private()).is_err());
    }
}
