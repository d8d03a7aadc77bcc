//! Bid sealing primitives for sealed-bid auctions.
//!
//! A bid amount is sealed so that only the evaluator can read it:
//!
//! 1. **Key agreement**: the bidder draws an ephemeral key pair and derives a
//!    shared secret with the evaluator's public point (X25519 + HKDF-SHA256).
//!    The evaluator derives the same secret from its private scalar and the
//!    bidder's ephemeral point.
//!
//! 2. **Sealing**: the amount is encoded as a 32-byte big-endian block and
//!    XORed with a keystream expanded from the shared secret and a fresh
//!    16-byte nonce. The ciphertext has the same fixed size as the block.
//!
//! 3. **Unsealing**: the evaluator recomputes the keystream and strips it.
//!    The 24 leading bytes of a valid block are zero, so a wrong key is
//!    reported instead of yielding a bogus amount.
//!
//! The keystream construction is a one-time pad: security rests on the
//! unpredictability of private scalars and on never reusing a nonce under
//! the same shared secret. It provides confidentiality only, no integrity.

pub mod error;
pub mod keys;
pub mod scheme;
pub mod seal;

pub use error::CryptoError;
pub use keys::{
    derive_shared_secret, public_point_from_hex, KeyPair, PrivateScalar, SharedSecret,
};
pub use scheme::{SealingScheme, X25519HkdfScheme};
pub use seal::{
    generate_nonce, open_sealed, seal, seal_block, seal_for_recipient, seal_u128, unseal,
    unseal_block,
};
