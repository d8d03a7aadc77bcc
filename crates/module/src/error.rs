//! Auction module error types.

use thiserror::Error;

use auction_crypto::CryptoError;
use auction_evaluator::EvaluatorError;
use auction_types::{Amount, AuctionId};

use crate::store::StoreError;

/// Errors that can occur in the auction module.
///
/// None of these leave an auction partially updated: a handler either
/// persists its whole change or returns one of these with the stored record
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No identity supplied; connect a wallet first")]
    MissingIdentity,

    #[error("Bid too low: minimum is {minimum}, got {got}")]
    BidTooLow { minimum: Amount, got: Amount },

    #[error("Auction is not accepting bids")]
    AuctionNotActive,

    #[error("Auction is still open for bidding")]
    AuctionNotEnded,

    #[error("Auction already settled")]
    AlreadySettled,

    #[error("Auction has no bids to evaluate")]
    EmptyBidSet,

    #[error("Sealing failure: {0}")]
    SealingFailure(String),

    #[error("Auction was settled by a concurrent call")]
    ConcurrentSettlementConflict,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Auction already has bids")]
    HasBids,

    #[error("Evaluator failure: {0}")]
    Evaluator(String),

    #[error("Storage failure: {0}")]
    Store(String),
}

impl AuctionError {
    /// Whether the auction's settlement is already decided by someone else.
    ///
    /// Callers should re-query the auction for the authoritative winner.
    pub fn is_settlement_decided(&self) -> bool {
        matches!(
            self,
            AuctionError::AlreadySettled | AuctionError::ConcurrentSettlementConflict
        )
    }
}

impl From<CryptoError> for AuctionError {
    fn from(err: CryptoError) -> Self {
        AuctionError::SealingFailure(err.to_string())
    }
}

impl From<EvaluatorError> for AuctionError {
    fn from(err: EvaluatorError) -> Self {
        match err {
            EvaluatorError::EmptyBidSet => AuctionError::EmptyBidSet,
            other => AuctionError::Evaluator(other.to_string()),
        }
    }
}

impl From<StoreError> for AuctionError {
    fn from(err: StoreError) -> Self {
        AuctionError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_decided_groups_both_kinds() {
        assert!(AuctionError::AlreadySettled.is_settlement_decided());
        assert!(AuctionError::ConcurrentSettlementConflict.is_settlement_decided());
        assert!(!AuctionError::AuctionNotEnded.is_settlement_decided());
    }

    #[test]
    fn test_messages_are_distinct() {
        let errors = [
            AuctionError::InvalidInput("x".into()),
            AuctionError::MissingIdentity,
            AuctionError::BidTooLow { minimum: 5, got: 3 },
            AuctionError::AuctionNotActive,
            AuctionError::AlreadySettled,
            AuctionError::EmptyBidSet,
            AuctionError::SealingFailure("x".into()),
            AuctionError::ConcurrentSettlementConflict,
        ];
        let messages: std::collections::HashSet<String> =
            errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), errors.len());
    }
}
