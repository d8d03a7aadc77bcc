//! Local-trust evaluator.

use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use auction_crypto::{KeyPair, PrivateScalar, SealingScheme, X25519HkdfScheme};
use auction_types::{sealed_inputs_digest, Amount, AuctionId, Bid, PublicPoint};

use crate::policy::{select_winner, Candidate};
use crate::{Evaluation, EvaluatorError, Evaluator};

/// Evaluator that unseals every bid in-process with its own private scalar.
///
/// Whoever runs this sees all clear amounts. It exists so the lifecycle can
/// be exercised end to end before a multi-party evaluator is available.
pub struct LocalEvaluator {
    keys: KeyPair,
    scheme: Box<dyn SealingScheme>,
}

impl LocalEvaluator {
    pub fn new(keys: KeyPair) -> Self {
        Self::with_scheme(keys, Box::new(X25519HkdfScheme))
    }

    pub fn with_scheme(keys: KeyPair, scheme: Box<dyn SealingScheme>) -> Self {
        Self { keys, scheme }
    }

    /// Evaluator with a freshly generated key pair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::new(KeyPair::generate(rng))
    }

    pub fn from_private(private: PrivateScalar) -> Self {
        Self::new(KeyPair::from_private(private))
    }
}

impl Evaluator for LocalEvaluator {
    fn public_key(&self) -> PublicPoint {
        self.keys.public()
    }

    fn evaluate(
        &self,
        auction_id: AuctionId,
        minimum_bid: Amount,
        bids: &[Bid],
    ) -> Result<Evaluation, EvaluatorError> {
        if bids.is_empty() {
            return Err(EvaluatorError::EmptyBidSet);
        }

        let mut candidates = Vec::with_capacity(bids.len());
        for bid in bids {
            match self.scheme.open(&bid.sealed, self.keys.private()) {
                Ok(amount) => candidates.push(Candidate {
                    bid_id: bid.id,
                    bidder: bid.bidder.clone(),
                    amount,
                    submitted_at: bid.submitted_at,
                }),
                Err(err) => {
                    warn!(auction_id, bid_id = bid.id, error = %err, "Skipping bid that failed to unseal");
                }
            }
        }

        if candidates.is_empty() {
            return Err(EvaluatorError::NoValidBids(bids.len()));
        }

        let unsealed = candidates.len();
        candidates.retain(|candidate| candidate.amount >= minimum_bid);
        if candidates.len() < unsealed {
            debug!(
                auction_id,
                rejected = unsealed - candidates.len(),
                minimum_bid,
                "Dropped bids below the minimum"
            );
        }

        let winner = select_winner(&candidates).ok_or(EvaluatorError::BelowMinimum {
            minimum: minimum_bid,
        })?;
        let computation_id = hex::encode(sealed_inputs_digest(auction_id, bids));

        debug!(
            auction_id,
            valid_bids = candidates.len(),
            winning_bid = winner.bid_id,
            "Evaluation complete"
        );

        Ok(Evaluation {
            winner: winner.bidder.clone(),
            amount: winner.amount,
            winning_bid: winner.bid_id,
            valid_bids: candidates.len() as u32,
            computation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::seal_for_recipient;
    use auction_types::{Identity, Timestamp};
    use rand::rngs::OsRng;

    fn sealed_bid(
        evaluator: &LocalEvaluator,
        id: u64,
        bidder: &str,
        amount: u64,
        submitted_at: Timestamp,
    ) -> Bid {
        Bid {
            id,
            bidder: Identity::parse(bidder).unwrap(),
            sealed: seal_for_recipient(amount, &evaluator.public_key(), &mut OsRng).unwrap(),
            submitted_at,
            tx_reference: None,
        }
    }

    #[test]
    fn test_evaluate_picks_highest() {
        let evaluator = LocalEvaluator::generate(&mut OsRng);
        let bids = vec![
            sealed_bid(&evaluator, 1, "a", 100, 1),
            sealed_bid(&evaluator, 2, "b", 300, 2),
            sealed_bid(&evaluator, 3, "c", 200, 3),
        ];
        let snapshot = bids.clone();

        let result = evaluator.evaluate(1, 1, &bids).unwrap();
        assert_eq!(result.winner.as_str(), "b");
        assert_eq!(result.amount, 300);
        assert_eq!(result.winning_bid, 2);
        assert_eq!(result.valid_bids, 3);
        assert_eq!(result.computation_id.len(), 64);
        assert_eq!(bids, snapshot);
    }

    #[test]
    fn test_evaluate_tie_break() {
        let evaluator = LocalEvaluator::generate(&mut OsRng);
        let bids = vec![
            sealed_bid(&evaluator, 1, "bidderX", 5, 100),
            sealed_bid(&evaluator, 2, "bidderY", 5, 50),
        ];
        assert_eq!(evaluator.evaluate(1, 1, &bids).unwrap().winner.as_str(), "bidderY");
    }

    #[test]
    fn test_evaluate_empty() {
        let evaluator = LocalEvaluator::generate(&mut OsRng);
        assert_eq!(evaluator.evaluate(1, 1, &[]), Err(EvaluatorError::EmptyBidSet));
    }

    #[test]
    fn test_bids_sealed_to_another_key_are_skipped() {
        let evaluator = LocalEvaluator::generate(&mut OsRng);
        let stranger = LocalEvaluator::generate(&mut OsRng);

        let bids = vec![
            sealed_bid(&stranger, 1, "misdirected", 1_000, 1),
            sealed_bid(&evaluator, 2, "honest", 10, 2),
        ];
        let result = evaluator.evaluate(4, 1, &bids).unwrap();
        assert_eq!(result.winner.as_str(), "honest");
        assert_eq!(result.valid_bids, 1);

        assert_eq!(
            evaluator.evaluate(4, 1, &bids[..1]),
            Err(EvaluatorError::NoValidBids(1))
        );
    }

    #[test]
    fn test_bids_below_minimum_never_win() {
        let evaluator = LocalEvaluator::generate(&mut OsRng);
        let bids = vec![
            sealed_bid(&evaluator, 1, "cheap", 1, 1),
            sealed_bid(&evaluator, 2, "fair", 600, 2),
            sealed_bid(&evaluator, 3, "short", 499, 3),
        ];

        let result = evaluator.evaluate(7, 500, &bids).unwrap();
        assert_eq!(result.winner.as_str(), "fair");
        assert_eq!(result.valid_bids, 1);

        assert_eq!(
            evaluator.evaluate(7, 500, &[bids[0].clone(), bids[2].clone()]),
            Err(EvaluatorError::BelowMinimum { minimum: 500 })
        );
    }
}
