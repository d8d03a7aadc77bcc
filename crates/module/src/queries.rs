//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state. Statuses are
//! reported as observed at the house clock, so an elapsed `Active` auction
//! shows up as `Closed`.

use serde::{Deserialize, Serialize};

use auction_types::{
    Amount, Auction, AuctionId, AuctionStatus, Bid, Identity, PublicPoint, Timestamp, Winner,
};

use crate::error::AuctionError;
use crate::handlers::{AuctionHouse, HandlerResult};

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: AuctionId },

    /// Get auction summaries (paginated).
    ListAuctions { offset: u64, limit: u64 },

    /// Get the sealed bids of an auction.
    GetAuctionBids { auction_id: AuctionId },

    /// Get the winner of a settled auction.
    GetWinner { auction_id: AuctionId },

    /// Summaries of auctions still taking bids.
    ActiveAuctions,

    /// Ids of auctions whose window has passed but are not settled.
    DueForSettlement,

    /// Public point bids must be sealed to.
    GetEvaluatorKey,
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    Auction(Option<Auction>),
    AuctionList(Vec<AuctionSummary>),
    Bids(Vec<Bid>),
    Winner(Option<Winner>),
    DueForSettlement(Vec<AuctionId>),
    EvaluatorKey(PublicPoint),
}

/// Listing view of an auction. Carries no sealed bid contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub id: AuctionId,
    pub creator: Identity,
    pub item_name: String,
    pub minimum_bid: Amount,
    pub open_until: Timestamp,
    pub status: AuctionStatus,
    pub bid_count: usize,
    pub winner: Option<Winner>,
}

impl AuctionSummary {
    pub fn from_auction(auction: &Auction, now: Timestamp) -> Self {
        Self {
            id: auction.id,
            creator: auction.creator.clone(),
            item_name: auction.item_name.clone(),
            minimum_bid: auction.minimum_bid,
            open_until: auction.open_until,
            status: auction.status_at(now),
            bid_count: auction.bids.len(),
            winner: auction.winner().cloned(),
        }
    }
}

/// Summaries of every auction accepting bids at `now`.
pub fn active_auctions(house: &AuctionHouse, now: Timestamp) -> HandlerResult<Vec<AuctionSummary>> {
    Ok(house
        .list_auctions()?
        .iter()
        .filter(|auction| auction.accepts_bids_at(now))
        .map(|auction| AuctionSummary::from_auction(auction, now))
        .collect())
}

/// Ids of auctions that are closed at `now` and still need settling.
pub fn due_for_settlement(house: &AuctionHouse, now: Timestamp) -> HandlerResult<Vec<AuctionId>> {
    Ok(house
        .list_auctions()?
        .iter()
        .filter(|auction| auction.status_at(now) == AuctionStatus::Closed)
        .map(|auction| auction.id)
        .collect())
}

/// Handle a query.
pub fn handle_query(house: &AuctionHouse, query: AuctionQuery) -> HandlerResult<AuctionQueryResponse> {
    let now = house.now();
    let response = match query {
        AuctionQuery::GetAuction { auction_id } => {
            let auction = match house.get_auction(auction_id) {
                Ok(auction) => Some(auction),
                Err(AuctionError::AuctionNotFound(_)) => None,
                Err(err) => return Err(err),
            };
            AuctionQueryResponse::Auction(auction)
        }

        AuctionQuery::ListAuctions { offset, limit } => {
            let auctions = house
                .list_auctions()?
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|auction| AuctionSummary::from_auction(auction, now))
                .collect();
            AuctionQueryResponse::AuctionList(auctions)
        }

        AuctionQuery::GetAuctionBids { auction_id } => {
            AuctionQueryResponse::Bids(house.get_auction(auction_id)?.bids)
        }

        AuctionQuery::GetWinner { auction_id } => {
            AuctionQueryResponse::Winner(house.get_auction(auction_id)?.winner().cloned())
        }

        AuctionQuery::ActiveAuctions => {
            AuctionQueryResponse::AuctionList(active_auctions(house, now)?)
        }

        AuctionQuery::DueForSettlement => {
            AuctionQueryResponse::DueForSettlement(due_for_settlement(house, now)?)
        }

        AuctionQuery::GetEvaluatorKey => AuctionQueryResponse::EvaluatorKey(house.evaluator_public()),
    };
    Ok(response)
}
