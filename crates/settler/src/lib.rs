//! Permissionless settlement sweeper for sealed-bid auctions.
//!
//! The settler service:
//! 1. Polls the auction house for auctions whose bidding window has passed
//! 2. Settles each one through the house, which calls the evaluator
//! 3. Treats auctions someone else settled first as done
//!
//! Anyone can run this service; settlement is idempotent from the caller's
//! point of view because the house commits at most once per auction.

pub mod service;

pub use service::{SettlementService, SettlerConfig, SweepReport};
