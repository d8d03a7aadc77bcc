//! Client SDK for bidding in sealed-bid auctions.
//!
//! This crate provides a high-level API for:
//! - Sealing bid amounts to an auction's evaluator key
//! - Enforcing the minimum bid before the amount is hidden
//! - Submitting bids to an auction house
//! - Rendering auction state for display

pub mod bid;
pub mod query;

pub use bid::{create_bid, submit_bid, BidBuilder, BidError, PreparedBid, SubmittedBid};
pub use query::{AuctionView, BidView};
