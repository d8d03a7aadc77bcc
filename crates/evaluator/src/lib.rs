//! Winner evaluation over sealed bids.
//!
//! The [`Evaluator`] trait is the boundary where a confidential-compute
//! network plugs in: it receives every sealed bid of a closed auction and
//! returns only the winner's identity and amount.
//!
//! [`LocalEvaluator`] is a single-process stand-in. It holds the evaluator
//! private scalar and therefore sees every clear amount while it runs; the
//! output contract still discloses only the winner. A multi-party
//! implementation (threshold-shared scalar, arg-max computed across nodes)
//! would implement the same trait.

pub mod local;
pub mod policy;

use thiserror::Error;

use auction_types::{Amount, AuctionId, Bid, BidId, Identity, PublicPoint};

pub use local::LocalEvaluator;
pub use policy::{select_winner, Candidate};

/// Errors that can occur during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluatorError {
    #[error("No bids to evaluate")]
    EmptyBidSet,

    #[error("None of the {0} bids could be unsealed")]
    NoValidBids(usize),

    #[error("No bid reached the minimum of {minimum}")]
    BelowMinimum { minimum: Amount },

    #[error("Evaluator unavailable: {0}")]
    Unavailable(String),
}

/// Output of a successful evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub winner: Identity,
    pub amount: Amount,
    pub winning_bid: BidId,
    /// Number of bids that unsealed at or above the minimum
    pub valid_bids: u32,
    /// Reference binding this result to its sealed inputs
    pub computation_id: String,
}

/// Determines the winner of an auction from its sealed bids.
///
/// Implementations must not mutate the bids and must apply the policy in
/// [`policy::select_winner`]. Bids whose clear amount is below
/// `minimum_bid` never win; when no bid reaches it the result is
/// [`EvaluatorError::BelowMinimum`].
pub trait Evaluator: Send + Sync {
    /// Public point bidders seal their amounts to.
    fn public_key(&self) -> PublicPoint;

    fn evaluate(
        &self,
        auction_id: AuctionId,
        minimum_bid: Amount,
        bids: &[Bid],
    ) -> Result<Evaluation, EvaluatorError>;
}
