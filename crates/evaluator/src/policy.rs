//! Winner-selection policy.
//!
//! First-price: the greatest amount wins and pays its own bid. Equal amounts
//! go to the earliest submission; the bid id (insertion order) breaks ties
//! between equal timestamps.

use std::cmp::Ordering;

use auction_types::{Amount, BidId, Identity, Timestamp};

/// An unsealed bid taking part in winner selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub bid_id: BidId,
    pub bidder: Identity,
    pub amount: Amount,
    pub submitted_at: Timestamp,
}

/// `Greater` when `a` beats `b`.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.amount
        .cmp(&b.amount)
        .then_with(|| b.submitted_at.cmp(&a.submitted_at))
        .then_with(|| b.bid_id.cmp(&a.bid_id))
}

/// Pick the winning candidate, if any.
pub fn select_winner(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().max_by(|a, b| rank(a, b))
}
