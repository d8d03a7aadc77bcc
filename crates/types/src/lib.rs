//! Core type definitions for sealed-bid auctions.
//!
//! This crate provides the records shared across the auction system: the
//! sealed form of a bid amount, bids, auctions and their settlement outcome.
//! Nothing in here can recover a clear bid amount; that needs the evaluator's
//! private scalar, which lives in `auction-crypto`.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

pub mod amount;

pub use amount::{format_amount, parse_amount, AmountError, LAMPORT_DECIMALS};

// =========================
// SEALED VALUES
// =========================

/// Size of a public point in bytes
pub const PUBLIC_POINT_SIZE: usize = 32;
/// Size of a sealed amount block in bytes
pub const SEALED_BLOCK_SIZE: usize = 32;
/// Size of a sealing nonce in bytes
pub const NONCE_SIZE: usize = 16;

/// Public half of a key pair (32 bytes)
#[serde_as]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct PublicPoint(#[serde_as(as = "Hex")] pub [u8; PUBLIC_POINT_SIZE]);

/// Ciphertext of one sealed amount (fixed size)
#[serde_as]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct SealedBlock(#[serde_as(as = "Hex")] pub [u8; SEALED_BLOCK_SIZE]);

/// Per-sealing nonce (fixed size)
#[serde_as]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Nonce(#[serde_as(as = "Hex")] pub [u8; NONCE_SIZE]);

/// An amount sealed to a recipient's public point.
///
/// The shared secret is derived from `sender_public` and the recipient's
/// private scalar, so only the recipient can open it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SealedValue {
    pub ciphertext: SealedBlock,
    /// Ephemeral public point of the sealing party
    pub sender_public: PublicPoint,
    pub nonce: Nonce,
}

// =========================
// AUCTION TYPES
// =========================

pub type AuctionId = u64;

/// Bid identifier, 1-based and in insertion order within its auction
pub type BidId = u64;

/// Amount in the smallest currency unit
pub type Amount = u64;

/// Unix time in milliseconds
pub type Timestamp = u64;

/// Opaque bidder/creator identity supplied by the wallet layer.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parse an identity, rejecting empty or whitespace-only strings.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Auction lifecycle state
///
/// Only `Active`, `Settled` and `Cancelled` are ever stored. `Closed` is
/// derived from the clock by [`Auction::status_at`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionStatus {
    /// Accepting bids
    Active,
    /// Bidding window elapsed, awaiting settlement
    Closed,
    /// Winner fixed (or recorded as unsold)
    Settled,
    /// Withdrawn by the creator before any bid arrived
    Cancelled,
}

/// A submitted sealed bid. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub bidder: Identity,
    pub sealed: SealedValue,
    pub submitted_at: Timestamp,
    /// Escrow transaction reference from the ledger layer, for audit only
    pub tx_reference: Option<String>,
}

/// Disclosed winner of a settled auction
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Winner {
    pub identity: Identity,
    pub amount: Amount,
}

/// Result of the one-time settlement transition
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum SettlementOutcome {
    Sold {
        winner: Winner,
        /// Evaluator reference for the computation that picked the winner
        computation_id: String,
    },
    /// Closed with no bid that could win
    Unsold,
}

impl SettlementOutcome {
    pub fn winner(&self) -> Option<&Winner> {
        match self {
            SettlementOutcome::Sold { winner, .. } => Some(winner),
            SettlementOutcome::Unsold => None,
        }
    }
}

/// Full auction record
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub creator: Identity,
    pub item_name: String,
    pub description: String,
    pub minimum_bid: Amount,

    // Timing
    pub created_at: Timestamp,
    pub open_until: Timestamp,

    /// Public point bids are sealed to
    pub evaluator_public: PublicPoint,

    pub bids: Vec<Bid>,
    pub status: AuctionStatus,
    pub outcome: Option<SettlementOutcome>,
    pub settled_at: Option<Timestamp>,
}

impl Auction {
    /// Status as observed at `now`.
    pub fn status_at(&self, now: Timestamp) -> AuctionStatus {
        match self.status {
            AuctionStatus::Active if now >= self.open_until => AuctionStatus::Closed,
            status => status,
        }
    }

    /// Whether a bid submitted at `now` may be appended.
    pub fn accepts_bids_at(&self, now: Timestamp) -> bool {
        self.status_at(now) == AuctionStatus::Active
    }

    /// The disclosed winner; only present once settled with a sale.
    pub fn winner(&self) -> Option<&Winner> {
        match self.status {
            AuctionStatus::Settled => self.outcome.as_ref().and_then(SettlementOutcome::winner),
            _ => None,
        }
    }

    pub fn next_bid_id(&self) -> BidId {
        self.bids.len() as BidId + 1
    }

    pub fn last_submission(&self) -> Option<Timestamp> {
        self.bids.last().map(|bid| bid.submitted_at)
    }

    /// Whether a bid already used this (sender key, nonce) pair.
    pub fn has_sealing(&self, sender_public: &PublicPoint, nonce: &Nonce) -> bool {
        self.bids
            .iter()
            .any(|bid| bid.sealed.sender_public == *sender_public && bid.sealed.nonce == *nonce)
    }
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Digest binding an auction id to the exact sealed inputs of a settlement.
pub fn sealed_inputs_digest(auction_id: AuctionId, bids: &[Bid]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SEALED_BID_SETTLEMENT_V1:");
    hasher.update(auction_id.to_le_bytes());
    for bid in bids {
        hasher.update(bid.id.to_le_bytes());
        hasher.update(bid.sealed.sender_public.0);
        hasher.update(bid.sealed.nonce.0);
        hasher.update(bid.sealed.ciphertext.0);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bid(id: BidId, byte: u8) -> Bid {
        Bid {
            id,
            bidder: Identity::parse(format!("bidder-{id}")).unwrap(),
            sealed: SealedValue {
                ciphertext: SealedBlock([byte; SEALED_BLOCK_SIZE]),
                sender_public: PublicPoint([byte; PUBLIC_POINT_SIZE]),
                nonce: Nonce([byte; NONCE_SIZE]),
            },
            submitted_at: 1_000 + id,
            tx_reference: None,
        }
    }

    fn sample_auction() -> Auction {
        Auction {
            id: 7,
            creator: Identity::parse("creator").unwrap(),
            item_name: "Lamp".to_string(),
            description: String::new(),
            minimum_bid: 10,
            created_at: 0,
            open_until: 5_000,
            evaluator_public: PublicPoint([9u8; PUBLIC_POINT_SIZE]),
            bids: vec![],
            status: AuctionStatus::Active,
            outcome: None,
            settled_at: None,
        }
    }

    #[test]
    fn test_identity_rejects_blank() {
        assert!(Identity::parse("").is_none());
        assert!(Identity::parse("   ").is_none());
        assert_eq!(Identity::parse("alice").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_closed_is_derived_from_time() {
        let auction = sample_auction();
        assert_eq!(auction.status_at(4_999), AuctionStatus::Active);
        assert_eq!(auction.status_at(5_000), AuctionStatus::Closed);
        assert!(!auction.accepts_bids_at(5_000));
    }

    #[test]
    fn test_settled_and_cancelled_ignore_time() {
        let mut auction = sample_auction();
        auction.status = AuctionStatus::Cancelled;
        assert_eq!(auction.status_at(10), AuctionStatus::Cancelled);

        auction.status = AuctionStatus::Settled;
        auction.outcome = Some(SettlementOutcome::Unsold);
        assert_eq!(auction.status_at(10), AuctionStatus::Settled);
        assert!(auction.winner().is_none());
    }

    #[test]
    fn test_winner_only_when_settled() {
        let mut auction = sample_auction();
        let outcome = SettlementOutcome::Sold {
            winner: Winner {
                identity: Identity::parse("bob").unwrap(),
                amount: 42,
            },
            computation_id: "abc".to_string(),
        };
        auction.outcome = Some(outcome);
        assert!(auction.winner().is_none());

        auction.status = AuctionStatus::Settled;
        assert_eq!(auction.winner().unwrap().amount, 42);
    }

    #[test]
    fn test_has_sealing_detects_reused_nonce() {
        let mut auction = sample_auction();
        auction.bids.push(sample_bid(1, 3));
        assert!(auction.has_sealing(&PublicPoint([3u8; 32]), &Nonce([3u8; 16])));
        assert!(!auction.has_sealing(&PublicPoint([3u8; 32]), &Nonce([4u8; 16])));
        assert_eq!(auction.next_bid_id(), 2);
        assert_eq!(auction.last_submission(), Some(1_001));
    }

    #[test]
    fn test_sealed_inputs_digest_binds_bids() {
        let one = sealed_inputs_digest(1, &[sample_bid(1, 1)]);
        let other_auction = sealed_inputs_digest(2, &[sample_bid(1, 1)]);
        let other_bid = sealed_inputs_digest(1, &[sample_bid(1, 2)]);

        assert_ne!(one, other_auction);
        assert_ne!(one, other_bid);
        assert_eq!(one, sealed_inputs_digest(1, &[sample_bid(1, 1)]));
    }

    #[test]
    fn test_sealed_value_borsh_serialization() {
        let sealed = sample_bid(1, 42).sealed;
        let encoded = borsh::to_vec(&sealed).unwrap();
        assert_eq!(encoded.len(), SEALED_BLOCK_SIZE + PUBLIC_POINT_SIZE + NONCE_SIZE);
        let decoded: SealedValue = borsh::from_slice(&encoded).unwrap();
        assert_eq!(sealed, decoded);
    }

    #[test]
    fn test_public_point_json_is_hex() {
        let json = serde_json::to_string(&PublicPoint([0xab; 32])).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }
}
