//! Call handlers for the auction module.
//!
//! [`AuctionHouse`] owns the store, the evaluator and the clock, and applies
//! every lifecycle transition:
//!
//! ```text
//! create_auction ──> Active ──(now >= open_until)──> Closed ──settle──> Settled
//!                      │
//!                      └──cancel (creator, no bids)──> Cancelled
//! ```
//!
//! `Closed` is never written; it is what an `Active` record looks like once
//! its bidding window has passed. Each auction has its own slot holding a
//! mutex for read-modify-write and an in-flight settlement flag. Slots are
//! only created for auctions the store knows about. Every read-modify-write
//! also holds the store's lock so that other processes sharing the store
//! cannot interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use auction_evaluator::{Evaluator, EvaluatorError};
use auction_types::{
    Auction, AuctionId, AuctionStatus, Bid, Identity, PublicPoint, SealedValue,
    SettlementOutcome, Timestamp, Winner,
};

use crate::clock::{Clock, SystemClock};
use crate::config::AuctionParams;
use crate::error::AuctionError;
use crate::store::AuctionStore;

/// Context provided by the caller for each call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    /// Identity supplied by the wallet layer; empty when none is connected
    pub sender: String,
}

impl CallContext {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    /// Context with no connected identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> HandlerResult<Identity> {
        Identity::parse(self.sender.as_str()).ok_or(AuctionError::MissingIdentity)
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Parameters of a new auction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAuction {
    pub item_name: String,
    pub description: String,
    pub minimum_bid: u64,
    pub open_until: Timestamp,
}

/// Progress points reported while settling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementStage {
    /// Settlement lock acquired
    Locked,
    /// Bids handed to the evaluator
    Evaluating,
    /// Outcome persisted
    Committed,
}

/// Side channel for settlement progress.
pub trait SettlementObserver {
    fn on_stage(&self, auction_id: AuctionId, stage: SettlementStage);
}

impl<F> SettlementObserver for F
where
    F: Fn(AuctionId, SettlementStage),
{
    fn on_stage(&self, auction_id: AuctionId, stage: SettlementStage) {
        self(auction_id, stage)
    }
}

/// Observer that ignores every stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SettlementObserver for NoopObserver {
    fn on_stage(&self, _auction_id: AuctionId, _stage: SettlementStage) {}
}

#[derive(Debug, Default)]
struct AuctionSlot {
    lock: Mutex<()>,
    settling: AtomicBool,
}

/// Clears the in-flight flag however settlement exits.
struct SettlingFlag<'a>(&'a AtomicBool);

impl Drop for SettlingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for [`AuctionHouse`].
pub struct AuctionHouseBuilder {
    store: Arc<dyn AuctionStore>,
    evaluator: Arc<dyn Evaluator>,
    clock: Arc<dyn Clock>,
    params: AuctionParams,
}

impl AuctionHouseBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(mut self, params: AuctionParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> HandlerResult<AuctionHouse> {
        self.params
            .validate()
            .map_err(|e| AuctionError::InvalidInput(e.to_string()))?;
        let next_id = self.store.max_id()?.map_or(1, |id| id + 1);

        Ok(AuctionHouse {
            store: self.store,
            evaluator: self.evaluator,
            clock: self.clock,
            params: self.params,
            next_id: AtomicU64::new(next_id),
            slots: Mutex::new(HashMap::new()),
        })
    }
}

/// Lifecycle manager for every auction in one store.
pub struct AuctionHouse {
    store: Arc<dyn AuctionStore>,
    evaluator: Arc<dyn Evaluator>,
    clock: Arc<dyn Clock>,
    params: AuctionParams,
    next_id: AtomicU64,
    slots: Mutex<HashMap<AuctionId, Arc<AuctionSlot>>>,
}

impl AuctionHouse {
    /// House with the system clock and default params.
    pub fn new(store: Arc<dyn AuctionStore>, evaluator: Arc<dyn Evaluator>) -> HandlerResult<Self> {
        Self::builder(store, evaluator).build()
    }

    pub fn builder(store: Arc<dyn AuctionStore>, evaluator: Arc<dyn Evaluator>) -> AuctionHouseBuilder {
        AuctionHouseBuilder {
            store,
            evaluator,
            clock: Arc::new(SystemClock),
            params: AuctionParams::default(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn params(&self) -> &AuctionParams {
        &self.params
    }

    /// Public point new auctions ask bidders to seal to.
    pub fn evaluator_public(&self) -> PublicPoint {
        self.evaluator.public_key()
    }

    fn slot(&self, auction_id: AuctionId) -> HandlerResult<Arc<AuctionSlot>> {
        if let Some(slot) = self.slots.lock().get(&auction_id) {
            return Ok(slot.clone());
        }
        // Records are never deleted, so a slot is made at most once per id.
        self.load(auction_id)?;
        Ok(self.slots.lock().entry(auction_id).or_default().clone())
    }

    fn load(&self, auction_id: AuctionId) -> HandlerResult<Auction> {
        self.store
            .get(auction_id)?
            .ok_or(AuctionError::AuctionNotFound(auction_id))
    }

    /// Handle CreateAuction call.
    pub fn create_auction(&self, ctx: &CallContext, request: CreateAuction) -> HandlerResult<Auction> {
        let creator = ctx.identity()?;
        let now = self.clock.now();
        self.validate_create(&request, now)?;

        let _store = self.store.lock()?;
        let stored_next = self.store.max_id()?.map_or(1, |id| id + 1);
        self.next_id.fetch_max(stored_next, Ordering::SeqCst);

        let auction = Auction {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            creator,
            item_name: request.item_name.trim().to_string(),
            description: request.description,
            minimum_bid: request.minimum_bid,
            created_at: now,
            open_until: request.open_until,
            evaluator_public: self.evaluator.public_key(),
            bids: Vec::new(),
            status: AuctionStatus::Active,
            outcome: None,
            settled_at: None,
        };
        self.store.put(&auction)?;

        info!(
            auction_id = auction.id,
            creator = %auction.creator,
            open_until = auction.open_until,
            "Auction created"
        );
        Ok(auction)
    }

    fn validate_create(&self, request: &CreateAuction, now: Timestamp) -> HandlerResult<()> {
        let name = request.item_name.trim();
        if name.is_empty() {
            return Err(AuctionError::InvalidInput("Item name is required".into()));
        }
        if name.chars().count() > self.params.max_item_name_len {
            return Err(AuctionError::InvalidInput(format!(
                "Item name longer than {} characters",
                self.params.max_item_name_len
            )));
        }
        if request.description.chars().count() > self.params.max_description_len {
            return Err(AuctionError::InvalidInput(format!(
                "Description longer than {} characters",
                self.params.max_description_len
            )));
        }
        if request.minimum_bid == 0 {
            return Err(AuctionError::InvalidInput(
                "Minimum bid must be greater than zero".into(),
            ));
        }
        if request.open_until <= now {
            return Err(AuctionError::InvalidInput(
                "End time must be in the future".into(),
            ));
        }

        let duration = request.open_until - now;
        if duration < self.params.min_duration_ms || duration > self.params.max_duration_ms {
            return Err(AuctionError::InvalidInput(format!(
                "Duration must be between {} and {} ms",
                self.params.min_duration_ms, self.params.max_duration_ms
            )));
        }
        Ok(())
    }

    /// Handle SubmitBid call.
    ///
    /// The sealed amount is never inspected here. A bid sealed below the
    /// minimum is stored and then discarded by the evaluator at settlement.
    pub fn submit_bid(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        sealed: SealedValue,
        tx_reference: Option<String>,
    ) -> HandlerResult<Bid> {
        let bidder = ctx.identity()?;
        let slot = self.slot(auction_id)?;
        let _guard = slot.lock.lock();
        let _store = self.store.lock()?;

        let mut auction = self.load(auction_id)?;
        let now = self.clock.now();
        if !auction.accepts_bids_at(now) {
            return Err(AuctionError::AuctionNotActive);
        }
        if auction.has_sealing(&sealed.sender_public, &sealed.nonce) {
            return Err(AuctionError::SealingFailure(
                "Nonce reused for this sender key".into(),
            ));
        }

        // Ties on time fall back to bid id order.
        let submitted_at = auction.last_submission().map_or(now, |last| last.max(now));
        let bid = Bid {
            id: auction.next_bid_id(),
            bidder,
            sealed,
            submitted_at,
            tx_reference,
        };
        auction.bids.push(bid.clone());
        self.store.put(&auction)?;

        debug!(auction_id, bid_id = bid.id, bidder = %bid.bidder, "Bid accepted");
        Ok(bid)
    }

    /// Handle SettleAuction call (permissionless).
    pub fn settle(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<Auction> {
        self.settle_with_observer(ctx, auction_id, &NoopObserver)
    }

    /// Settle, reporting progress to `observer`.
    ///
    /// At most one call per auction can commit. A call that arrives while
    /// another settlement is in flight waits for it. If that settlement
    /// committed, the waiting call gets `ConcurrentSettlementConflict`; if it
    /// failed, the waiting call settles the auction itself. A call that
    /// arrives after the commit gets `AlreadySettled`. On any error the
    /// stored record is left as it was.
    pub fn settle_with_observer(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        observer: &dyn SettlementObserver,
    ) -> HandlerResult<Auction> {
        let slot = self.slot(auction_id)?;
        // Another settlement already holds the lock.
        let contended = slot.settling.load(Ordering::Acquire);
        let _guard = slot.lock.lock();
        slot.settling.store(true, Ordering::Release);
        let _flag = SettlingFlag(&slot.settling);
        let _store = self.store.lock()?;
        observer.on_stage(auction_id, SettlementStage::Locked);

        let mut auction = self.load(auction_id)?;
        let now = self.clock.now();
        match auction.status_at(now) {
            AuctionStatus::Closed => {}
            AuctionStatus::Settled if contended => {
                return Err(AuctionError::ConcurrentSettlementConflict)
            }
            AuctionStatus::Settled => return Err(AuctionError::AlreadySettled),
            AuctionStatus::Cancelled => return Err(AuctionError::AuctionNotActive),
            AuctionStatus::Active => return Err(AuctionError::AuctionNotEnded),
        }

        let outcome = if auction.bids.is_empty() {
            SettlementOutcome::Unsold
        } else {
            observer.on_stage(auction_id, SettlementStage::Evaluating);
            match self
                .evaluator
                .evaluate(auction_id, auction.minimum_bid, &auction.bids)
            {
                Ok(evaluation) => SettlementOutcome::Sold {
                    winner: Winner {
                        identity: evaluation.winner,
                        amount: evaluation.amount,
                    },
                    computation_id: evaluation.computation_id,
                },
                Err(
                    err @ (EvaluatorError::EmptyBidSet
                    | EvaluatorError::NoValidBids(_)
                    | EvaluatorError::BelowMinimum { .. }),
                ) => {
                    warn!(auction_id, error = %err, "No winning bid, settling as unsold");
                    SettlementOutcome::Unsold
                }
                Err(err) => return Err(err.into()),
            }
        };

        auction.status = AuctionStatus::Settled;
        auction.outcome = Some(outcome);
        auction.settled_at = Some(now);
        self.store.put(&auction)?;
        observer.on_stage(auction_id, SettlementStage::Committed);

        match auction.winner() {
            Some(winner) => info!(
                auction_id,
                settled_by = %ctx.sender,
                winner = %winner.identity,
                amount = winner.amount,
                "Auction settled"
            ),
            None => info!(auction_id, settled_by = %ctx.sender, "Auction settled unsold"),
        }
        Ok(auction)
    }

    /// Handle CancelAuction call. Creator only, before any bid arrives.
    pub fn cancel_auction(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<Auction> {
        let caller = ctx.identity()?;
        let slot = self.slot(auction_id)?;
        let _guard = slot.lock.lock();
        let _store = self.store.lock()?;

        let mut auction = self.load(auction_id)?;
        if auction.creator != caller {
            return Err(AuctionError::NotAuthorized);
        }
        if auction.status_at(self.clock.now()) != AuctionStatus::Active {
            return Err(AuctionError::AuctionNotActive);
        }
        if !auction.bids.is_empty() {
            return Err(AuctionError::HasBids);
        }

        auction.status = AuctionStatus::Cancelled;
        self.store.put(&auction)?;

        info!(auction_id, "Auction cancelled");
        Ok(auction)
    }

    pub fn get_auction(&self, auction_id: AuctionId) -> HandlerResult<Auction> {
        self.load(auction_id)
    }

    pub fn list_auctions(&self) -> HandlerResult<Vec<Auction>> {
        Ok(self.store.list()?)
    }
}
