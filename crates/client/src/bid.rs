//! Bid creation and sealing.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

use auction_crypto::{seal_for_recipient, CryptoError};
use auction_module::{AuctionError, AuctionHouse, CallContext};
use auction_types::{Amount, Auction, AuctionId, Bid, SealedValue, Timestamp};

/// Errors that can occur during bid creation.
#[derive(Debug, Error)]
pub enum BidError {
    #[error(transparent)]
    Auction(#[from] AuctionError),

    #[error("Sealing failed: {0}")]
    Sealing(#[from] CryptoError),
}

impl BidError {
    /// The lifecycle error behind this failure, if any.
    pub fn auction_error(&self) -> Option<&AuctionError> {
        match self {
            BidError::Auction(err) => Some(err),
            BidError::Sealing(_) => None,
        }
    }
}

/// A prepared bid ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    /// Amount sealed to the auction's evaluator
    pub sealed: SealedValue,
    /// Original bid value (keep secret)
    pub clear_amount: Amount,
}

/// A bid accepted by the auction house.
#[derive(Debug, Clone)]
pub struct SubmittedBid {
    pub bid: Bid,
    /// Original bid value (keep secret)
    pub clear_amount: Amount,
}

/// Create a sealed bid for an auction.
///
/// # Arguments
/// * `auction` - Auction to bid in; its evaluator key is the sealing recipient
/// * `amount` - The bid amount in the smallest unit
/// * `now` - Current time, used to reject bids on closed auctions early
/// * `rng` - Cryptographically secure random number generator
///
/// Amounts below the minimum are refused here, before sealing. The house
/// cannot see them; the evaluator discards them at settlement.
pub fn create_bid<R: RngCore + CryptoRng>(
    auction: &Auction,
    amount: Amount,
    now: Timestamp,
    rng: &mut R,
) -> Result<PreparedBid, BidError> {
    if !auction.accepts_bids_at(now) {
        return Err(AuctionError::AuctionNotActive.into());
    }
    if amount < auction.minimum_bid {
        return Err(AuctionError::BidTooLow {
            minimum: auction.minimum_bid,
            got: amount,
        }
        .into());
    }

    let sealed = seal_for_recipient(amount, &auction.evaluator_public, rng)?;
    Ok(PreparedBid {
        sealed,
        clear_amount: amount,
    })
}

/// Seal `amount` for `auction_id` and submit it as `ctx.sender`.
pub fn submit_bid<R: RngCore + CryptoRng>(
    house: &AuctionHouse,
    ctx: &CallContext,
    auction_id: AuctionId,
    amount: Amount,
    tx_reference: Option<String>,
    rng: &mut R,
) -> Result<SubmittedBid, BidError> {
    BidBuilder::new(auction_id)
        .amount(amount)
        .tx_reference(tx_reference)
        .submit(house, ctx, rng)
}

/// Builder for creating bids with additional options.
pub struct BidBuilder {
    auction_id: AuctionId,
    amount: Amount,
    tx_reference: Option<String>,
}

impl BidBuilder {
    /// Create a new bid builder.
    pub fn new(auction_id: AuctionId) -> Self {
        Self {
            auction_id,
            amount: 0,
            tx_reference: None,
        }
    }

    /// Set the bid amount.
    pub fn amount(mut self, amount: Amount) -> Self {
        self.amount = amount;
        self
    }

    /// Attach the escrow transaction reference from the ledger layer.
    pub fn tx_reference(mut self, reference: Option<String>) -> Self {
        self.tx_reference = reference;
        self
    }

    /// Seal against `auction` without submitting.
    pub fn build<R: RngCore + CryptoRng>(
        &self,
        auction: &Auction,
        now: Timestamp,
        rng: &mut R,
    ) -> Result<PreparedBid, BidError> {
        if auction.id != self.auction_id {
            return Err(AuctionError::InvalidInput(format!(
                "Bid prepared for auction {} but got auction {}",
                self.auction_id, auction.id
            ))
            .into());
        }
        create_bid(auction, self.amount, now, rng)
    }

    /// Fetch the auction, seal and submit.
    pub fn submit<R: RngCore + CryptoRng>(
        self,
        house: &AuctionHouse,
        ctx: &CallContext,
        rng: &mut R,
    ) -> Result<SubmittedBid, BidError> {
        ctx.identity()?;
        let auction = house.get_auction(self.auction_id)?;
        let prepared = self.build(&auction, house.now(), rng)?;
        let bid = house.submit_bid(ctx, self.auction_id, prepared.sealed, self.tx_reference)?;

        Ok(SubmittedBid {
            bid,
            clear_amount: prepared.clear_amount,
        })
    }
}
