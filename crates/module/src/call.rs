//! Call message types for the auction module.
//!
//! Callers that ship operations as messages (a queue, a socket) encode an
//! [`AuctionCall`] with borsh and hand the decoded value to [`dispatch`].

use borsh::{BorshDeserialize, BorshSerialize};

use auction_types::{Amount, Auction, AuctionId, Bid, SealedValue, Timestamp};

use crate::error::AuctionError;
use crate::handlers::{AuctionHouse, CallContext, CreateAuction, HandlerResult};

/// Call messages for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    /// Create a new auction.
    CreateAuction {
        item_name: String,
        description: String,
        minimum_bid: Amount,
        open_until: Timestamp,
    },

    /// Submit a sealed bid.
    SubmitBid {
        auction_id: AuctionId,
        sealed: SealedValue,
        tx_reference: Option<String>,
    },

    /// Settle a closed auction (permissionless).
    SettleAuction { auction_id: AuctionId },

    /// Withdraw an auction that has no bids (creator only).
    CancelAuction { auction_id: AuctionId },
}

impl AuctionCall {
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> HandlerResult<Self> {
        borsh::from_slice(bytes).map_err(|e| AuctionError::InvalidInput(format!("Malformed call: {e}")))
    }
}

/// What a dispatched call produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallResponse {
    Auction(Auction),
    Bid(Bid),
}

/// Route a call to its handler.
pub fn dispatch(house: &AuctionHouse, ctx: &CallContext, call: AuctionCall) -> HandlerResult<CallResponse> {
    match call {
        AuctionCall::CreateAuction {
            item_name,
            description,
            minimum_bid,
            open_until,
        } => house
            .create_auction(
                ctx,
                CreateAuction {
                    item_name,
                    description,
                    minimum_bid,
                    open_until,
                },
            )
            .map(CallResponse::Auction),

        AuctionCall::SubmitBid {
            auction_id,
            sealed,
            tx_reference,
        } => house
            .submit_bid(ctx, auction_id, sealed, tx_reference)
            .map(CallResponse::Bid),

        AuctionCall::SettleAuction { auction_id } => {
            house.settle(ctx, auction_id).map(CallResponse::Auction)
        }

        AuctionCall::CancelAuction { auction_id } => {
            house.cancel_auction(ctx, auction_id).map(CallResponse::Auction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use auction_crypto::seal_for_recipient;
    use auction_evaluator::LocalEvaluator;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_encoded_calls() {
        let clock = Arc::new(ManualClock::new(0));
        let house = AuctionHouse::builder(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalEvaluator::generate(&mut OsRng)),
        )
        .clock(clock.clone())
        .build()
        .unwrap();

        let create = AuctionCall::CreateAuction {
            item_name: "Lamp".into(),
            description: String::new(),
            minimum_bid: 10,
            open_until: 120_000,
        };
        let decoded = AuctionCall::from_bytes(&create.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, create);

        let auction = match dispatch(&house, &CallContext::new("alice"), decoded).unwrap() {
            CallResponse::Auction(auction) => auction,
            other => panic!("unexpected response: {other:?}"),
        };

        let sealed = seal_for_recipient(25, &auction.evaluator_public, &mut OsRng).unwrap();
        let submit = AuctionCall::SubmitBid {
            auction_id: auction.id,
            sealed,
            tx_reference: None,
        };
        let response = dispatch(&house, &CallContext::new("bob"), submit).unwrap();
        assert!(matches!(response, CallResponse::Bid(ref bid) if bid.id == 1));

        clock.set(120_000);
        let settled = dispatch(
            &house,
            &CallContext::new("carol"),
            AuctionCall::SettleAuction { auction_id: auction.id },
        )
        .unwrap();
        match settled {
            CallResponse::Auction(auction) => assert_eq!(auction.winner().unwrap().amount, 25),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_call_rejected() {
        assert!(matches!(
            AuctionCall::from_bytes(&[0xff, 0x00]),
            Err(AuctionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_encoded_call_is_not_empty() {
        let call = AuctionCall::SettleAuction { auction_id: 9 };
        let bytes = call.to_bytes().unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(AuctionCall::from_bytes(&bytes).unwrap(), call);
    }
}
