//! Display views of auction state.
//!
//! Views carry decimal-formatted amounts and the status as observed at a
//! given time. Sealed bid contents are never included.

use serde::Serialize;

use auction_types::{format_amount, Auction, AuctionId, AuctionStatus, BidId, Timestamp};

/// Bid as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidView {
    pub id: BidId,
    pub bidder: String,
    pub submitted_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_reference: Option<String>,
}

/// Auction as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionView {
    pub id: AuctionId,
    pub creator: String,
    pub item_name: String,
    pub description: String,
    pub minimum_bid: String,
    pub created_at: Timestamp,
    pub open_until: Timestamp,
    pub status: AuctionStatus,
    pub bids: Vec<BidView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_bid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<Timestamp>,
}

impl AuctionView {
    pub fn new(auction: &Auction, now: Timestamp, decimals: u32) -> Self {
        let winner = auction.winner();
        Self {
            id: auction.id,
            creator: auction.creator.to_string(),
            item_name: auction.item_name.clone(),
            description: auction.description.clone(),
            minimum_bid: format_amount(auction.minimum_bid, decimals),
            created_at: auction.created_at,
            open_until: auction.open_until,
            status: auction.status_at(now),
            bids: auction
                .bids
                .iter()
                .map(|bid| BidView {
                    id: bid.id,
                    bidder: bid.bidder.to_string(),
                    submitted_at: bid.submitted_at,
                    tx_reference: bid.tx_reference.clone(),
                })
                .collect(),
            winner: winner.map(|w| w.identity.to_string()),
            winning_bid: winner.map(|w| format_amount(w.amount, decimals)),
            settled_at: auction.settled_at,
        }
    }

    /// One-line summary for listings.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "[{}] {} - {:?} (min {}, {} bids)",
            self.id,
            self.item_name,
            self.status,
            self.minimum_bid,
            self.bids.len()
        );
        if let (Some(winner), Some(amount)) = (&self.winner, &self.winning_bid) {
            line.push_str(&format!(" won by {} at {}", winner, amount));
        }
        line
    }
}
