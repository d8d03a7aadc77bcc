//! Sealed-bid auction lifecycle.
//!
//! This module implements the state machine around sealed bids:
//!
//! - Auction creation with validated item, minimum bid and end time
//! - Sealed bid submission while the bidding window is open
//! - Exactly-once settlement through a pluggable evaluator
//! - Cancellation of auctions that never received a bid
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `store`: Persistence backends
//! - `clock`: Time source
//! - `config`: Validation limits
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{AuctionHouse, CallContext, CreateAuction, MemoryStore};
//!
//! let house = AuctionHouse::new(Arc::new(MemoryStore::new()), evaluator)?;
//! let auction = house.create_auction(&CallContext::new("alice"), request)?;
//! house.submit_bid(&CallContext::new("bob"), auction.id, sealed, None)?;
//!
//! // once the window has passed
//! let settled = house.settle(&CallContext::new("anyone"), auction.id)?;
//! ```

pub mod call;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod queries;
pub mod store;

pub use call::{dispatch, AuctionCall, CallResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuctionParams, ConfigError};
pub use error::AuctionError;
pub use handlers::{
    AuctionHouse, AuctionHouseBuilder, CallContext, CreateAuction, HandlerResult, NoopObserver,
    SettlementObserver, SettlementStage,
};
pub use queries::{
    active_auctions, due_for_settlement, handle_query, AuctionQuery, AuctionQueryResponse,
    AuctionSummary,
};
pub use store::{AuctionStore, JsonFileStore, MemoryStore, StoreError, StoreLock};
