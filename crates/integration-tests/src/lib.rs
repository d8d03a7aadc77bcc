//! End-to-end integration tests for the sealed-bid auction system.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Evaluator key setup
//! 2. Auction creation
//! 3. Bid sealing and submission
//! 4. Close by time
//! 5. Exactly-once settlement through the evaluator

use std::sync::{Arc, Barrier};
use std::thread;

use auction_client::{create_bid, submit_bid, BidError};
use auction_crypto::{
    derive_shared_secret, generate_nonce, open_sealed, seal, unseal, KeyPair, SharedSecret,
};
use auction_evaluator::{Evaluator, LocalEvaluator};
use auction_module::{
    AuctionError, AuctionHouse, CallContext, CreateAuction, JsonFileStore, ManualClock,
    MemoryStore,
};
use auction_settler::{SettlementService, SettlerConfig};
use auction_types::{
    parse_amount, Auction, AuctionStatus, Identity, SettlementOutcome, LAMPORT_DECIMALS,
};

use rand::rngs::OsRng;
use rand::RngCore;

const MINUTE: u64 = 60 * 1000;
const HOUR: u64 = 60 * MINUTE;
const START: u64 = 1_700_000_000_000;

struct Harness {
    house: Arc<AuctionHouse>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let house = AuctionHouse::builder(
        Arc::new(MemoryStore::new()),
        Arc::new(LocalEvaluator::generate(&mut OsRng)),
    )
    .clock(clock.clone())
    .build()
    .unwrap();
    Harness {
        house: Arc::new(house),
        clock,
    }
}

fn create_auction(house: &AuctionHouse, minimum_bid: u64) -> Auction {
    house
        .create_auction(
            &CallContext::new("seller"),
            CreateAuction {
                item_name: "Signed first edition".to_string(),
                description: "Hardcover, good condition".to_string(),
                minimum_bid,
                open_until: house.now() + HOUR,
            },
        )
        .unwrap()
}

fn sol(amount: &str) -> u64 {
    parse_amount(amount, LAMPORT_DECIMALS).unwrap()
}

/// Both parties derive the same secret from their own scalar and the other's point.
#[test]
fn test_shared_secret_symmetry() {
    let mut rng = OsRng;
    for _ in 0..32 {
        let a = KeyPair::generate(&mut rng);
        let b = KeyPair::generate(&mut rng);
        assert_eq!(
            derive_shared_secret(a.private(), &b.public()).unwrap(),
            derive_shared_secret(b.private(), &a.public()).unwrap()
        );
    }
}

/// Unsealing with the same secret and nonce returns the sealed value.
#[test]
fn test_seal_unseal_roundtrip() {
    let mut rng = OsRng;
    let a = KeyPair::generate(&mut rng);
    let b = KeyPair::generate(&mut rng);
    let secret = derive_shared_secret(a.private(), &b.public()).unwrap();

    for _ in 0..64 {
        let value = rng.next_u64();
        let nonce = generate_nonce(&mut rng);
        let sealed = seal(value, &secret, &nonce).unwrap();
        assert_eq!(unseal(&sealed, &secret, &nonce).unwrap(), value);
    }
}

/// A wrong secret never reproduces the sealed value.
#[test]
fn test_wrong_key_does_not_reveal_value() {
    let mut rng = OsRng;
    let value = sol("0.5");
    let secret = derive_shared_secret(
        KeyPair::generate(&mut rng).private(),
        &KeyPair::generate(&mut rng).public(),
    )
    .unwrap();
    let nonce = generate_nonce(&mut rng);
    let sealed = seal(value, &secret, &nonce).unwrap();

    let mut rejected = 0;
    for _ in 0..256 {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        match unseal(&sealed, &SharedSecret::from_bytes(bytes), &nonce) {
            Ok(recovered) => assert_ne!(recovered, value),
            Err(_) => rejected += 1,
        }
    }
    // A random 24-byte prefix is all zero with negligible probability.
    assert_eq!(rejected, 256);
}

/// Scenario: minimum 0.5, a low bid, a valid bid, a late bid, then settlement.
#[test]
fn test_full_auction_flow() {
    let h = harness();
    let auction = create_auction(&h.house, sol("0.5"));
    assert_eq!(auction.status, AuctionStatus::Active);

    let low = submit_bid(&h.house, &CallContext::new("alice"), auction.id, sol("0.3"), None, &mut OsRng);
    assert!(matches!(
        low,
        Err(BidError::Auction(AuctionError::BidTooLow { .. }))
    ));

    let accepted = submit_bid(&h.house, &CallContext::new("bob"), auction.id, sol("0.5"), None, &mut OsRng)
        .unwrap();
    assert_eq!(accepted.bid.id, 1);
    assert_eq!(h.house.get_auction(auction.id).unwrap().status, AuctionStatus::Active);

    h.clock.advance(HOUR);
    let late = submit_bid(&h.house, &CallContext::new("carol"), auction.id, sol("10"), None, &mut OsRng);
    assert_eq!(
        late.unwrap_err().auction_error(),
        Some(&AuctionError::AuctionNotActive)
    );

    // Sealed bids are refused once the window has passed.
    let bypass = open_auction_bid(&h.house.get_auction(auction.id).unwrap(), sol("10"));
    assert_eq!(
        h.house.submit_bid(&CallContext::new("carol"), auction.id, bypass, None),
        Err(AuctionError::AuctionNotActive)
    );

    let settled = h.house.settle(&CallContext::new("anyone"), auction.id).unwrap();
    assert_eq!(settled.status, AuctionStatus::Settled);
    assert_eq!(settled.bids.len(), 1);
    let winner = settled.winner().unwrap();
    assert_eq!(winner.identity.as_str(), "bob");
    assert_eq!(winner.amount, sol("0.5"));
}

fn open_auction_bid(auction: &Auction, amount: u64) -> auction_types::SealedValue {
    auction_crypto::seal_for_recipient(amount, &auction.evaluator_public, &mut OsRng).unwrap()
}

/// Scenario: settling an auction that closed with no bids records it as unsold.
#[test]
fn test_zero_bid_auction_settles_unsold() {
    let h = harness();
    let auction = create_auction(&h.house, sol("1"));
    h.clock.advance(HOUR);

    let settled = h.house.settle(&CallContext::new("seller"), auction.id).unwrap();
    assert_eq!(settled.status, AuctionStatus::Settled);
    assert_eq!(settled.outcome, Some(SettlementOutcome::Unsold));
    assert!(settled.winner().is_none());
    assert_eq!(
        h.house.settle(&CallContext::new("seller"), auction.id),
        Err(AuctionError::AlreadySettled)
    );
}

/// Equal amounts go to the earlier submission.
#[test]
fn test_winner_tie_break() {
    let h = harness();
    let auction = create_auction(&h.house, 1);

    h.clock.advance(50);
    submit_bid(&h.house, &CallContext::new("bidderY"), auction.id, 5, None, &mut OsRng).unwrap();
    h.clock.advance(50);
    submit_bid(&h.house, &CallContext::new("bidderX"), auction.id, 5, None, &mut OsRng).unwrap();
    submit_bid(&h.house, &CallContext::new("bidderZ"), auction.id, 4, None, &mut OsRng).unwrap();

    h.clock.advance(HOUR);
    let settled = h.house.settle(&CallContext::new("anyone"), auction.id).unwrap();
    assert_eq!(settled.winner().unwrap().identity.as_str(), "bidderY");
}

/// No sequence of calls moves a settled auction back or lets a bid in afterwards.
#[test]
fn test_monotonic_lifecycle() {
    let h = harness();
    let auction = create_auction(&h.house, 10);
    submit_bid(&h.house, &CallContext::new("bob"), auction.id, 20, None, &mut OsRng).unwrap();

    h.clock.advance(HOUR);
    assert_eq!(
        h.house.get_auction(auction.id).unwrap().status_at(h.house.now()),
        AuctionStatus::Closed
    );
    h.house.settle(&CallContext::new("anyone"), auction.id).unwrap();
    let settled = h.house.get_auction(auction.id).unwrap();

    let ctx = CallContext::new("seller");
    assert_eq!(h.house.cancel_auction(&ctx, auction.id), Err(AuctionError::AuctionNotActive));
    let sealed = open_auction_bid(&settled, 99);
    assert_eq!(
        h.house.submit_bid(&ctx, auction.id, sealed, None),
        Err(AuctionError::AuctionNotActive)
    );

    // Rewinding the clock does not reopen it.
    h.clock.set(START);
    let rewound = h.house.get_auction(auction.id).unwrap();
    assert_eq!(rewound.status_at(h.house.now()), AuctionStatus::Settled);
    assert!(!rewound.accepts_bids_at(h.house.now()));
    assert_eq!(rewound, settled);
}

/// Concurrent settle calls produce exactly one commit.
#[test]
fn test_concurrent_settlement_commits_once() {
    const CALLERS: usize = 8;

    for _ in 0..10 {
        let h = harness();
        let auction = create_auction(&h.house, 1);
        for (bidder, amount) in [("a", 10), ("b", 30), ("c", 20)] {
            submit_bid(&h.house, &CallContext::new(bidder), auction.id, amount, None, &mut OsRng)
                .unwrap();
        }
        h.clock.advance(HOUR);

        let barrier = Barrier::new(CALLERS);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|i| {
                    let house = &h.house;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        house.settle(&CallContext::new(format!("settler-{i}")), auction.id)
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let committed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(committed.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(AuctionError::is_settlement_decided));

        let stored = h.house.get_auction(auction.id).unwrap();
        assert_eq!(&stored, committed[0]);
        assert_eq!(stored.winner().unwrap().identity.as_str(), "b");
    }
}

/// Bids racing each other are all kept, with distinct ids in arrival order.
#[test]
fn test_concurrent_bids_are_all_recorded() {
    let h = harness();
    let auction = create_auction(&h.house, 1);

    thread::scope(|s| {
        for i in 0..16u64 {
            let house = &h.house;
            s.spawn(move || {
                submit_bid(house, &CallContext::new(format!("bidder-{i}")), auction.id, 100 + i, None, &mut OsRng)
                    .unwrap();
            });
        }
    });

    let stored = h.house.get_auction(auction.id).unwrap();
    let ids: Vec<_> = stored.bids.iter().map(|bid| bid.id).collect();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());

    h.clock.advance(HOUR);
    let settled = h.house.settle(&CallContext::new("anyone"), auction.id).unwrap();
    assert_eq!(settled.winner().unwrap().amount, 115);
    assert_eq!(settled.winner().unwrap().identity.as_str(), "bidder-15");
}

/// Only the evaluator can open bids; nobody else holding the record can.
#[test]
fn test_bids_opaque_without_evaluator_key() {
    let evaluator = LocalEvaluator::generate(&mut OsRng);
    let outsider = KeyPair::generate(&mut OsRng);
    let auction = Auction {
        id: 1,
        creator: Identity::parse("seller").unwrap(),
        item_name: "Lamp".to_string(),
        description: String::new(),
        minimum_bid: 1,
        created_at: 0,
        open_until: HOUR,
        evaluator_public: evaluator.public_key(),
        bids: vec![],
        status: AuctionStatus::Active,
        outcome: None,
        settled_at: None,
    };

    let prepared = create_bid(&auction, 42, 0, &mut OsRng).unwrap();
    assert!(open_sealed(&prepared.sealed, outsider.private()).is_err());
}

/// Cancel only works for the creator of an auction without bids.
#[test]
fn test_cancel_flow() {
    let h = harness();
    let empty = create_auction(&h.house, 1);
    let with_bid = create_auction(&h.house, 1);
    submit_bid(&h.house, &CallContext::new("bob"), with_bid.id, 5, None, &mut OsRng).unwrap();

    let seller = CallContext::new("seller");
    assert_eq!(
        h.house.cancel_auction(&CallContext::new("bob"), empty.id),
        Err(AuctionError::NotAuthorized)
    );
    assert_eq!(h.house.cancel_auction(&seller, with_bid.id), Err(AuctionError::HasBids));

    let cancelled = h.house.cancel_auction(&seller, empty.id).unwrap();
    assert_eq!(cancelled.status, AuctionStatus::Cancelled);

    h.clock.advance(HOUR);
    let service = SettlementService::new(h.house.clone(), SettlerConfig::default());
    let report = service.run_once().unwrap();
    assert_eq!(report.sold, vec![with_bid.id]);
    assert!(report.unsold.is_empty());
    assert_eq!(h.house.get_auction(empty.id).unwrap().status, AuctionStatus::Cancelled);
}

/// A settled auction survives a restart of a file-backed house.
#[test]
fn test_file_store_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auctions.json");
    let keys = KeyPair::generate(&mut OsRng);
    let clock = Arc::new(ManualClock::new(START));

    let open = |clock: Arc<ManualClock>| {
        AuctionHouse::builder(
            Arc::new(JsonFileStore::open(&path).unwrap()),
            Arc::new(LocalEvaluator::new(keys.clone())),
        )
        .clock(clock)
        .build()
        .unwrap()
    };

    let auction_id = {
        let house = open(clock.clone());
        let auction = create_auction(&house, 1);
        submit_bid(&house, &CallContext::new("bob"), auction.id, 7, None, &mut OsRng).unwrap();
        auction.id
    };

    clock.advance(HOUR);
    let house = open(clock.clone());
    let settled = house.settle(&CallContext::new("anyone"), auction_id).unwrap();
    assert_eq!(settled.winner().unwrap().amount, 7);
    assert_eq!(create_auction(&house, 1).id, auction_id + 1);
}

/// A bid sealed below the minimum and sent straight to the house is stored
/// but never wins.
#[test]
fn test_bid_below_minimum_sent_directly_cannot_win() {
    let h = harness();
    let auction = create_auction(&h.house, sol("0.5"));

    let cheap = open_auction_bid(&auction, 1);
    h.house
        .submit_bid(&CallContext::new("cheap"), auction.id, cheap, None)
        .unwrap();

    h.clock.advance(HOUR);
    let settled = h.house.settle(&CallContext::new("anyone"), auction.id).unwrap();
    assert_eq!(settled.status, AuctionStatus::Settled);
    assert_eq!(settled.outcome, Some(SettlementOutcome::Unsold));
    assert_eq!(settled.bids.len(), 1);
}

/// Two houses on the same file, as two CLI processes would be, see each
/// other's writes and never drop each other's records.
#[test]
fn test_file_store_shared_between_houses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auctions.json");
    let keys = KeyPair::generate(&mut OsRng);
    let clock = Arc::new(ManualClock::new(START));

    let open = || {
        AuctionHouse::builder(
            Arc::new(JsonFileStore::open(&path).unwrap()),
            Arc::new(LocalEvaluator::new(keys.clone())),
        )
        .clock(clock.clone())
        .build()
        .unwrap()
    };

    let settler = open();
    let auction = create_auction(&settler, 1);

    let bidder = open();
    submit_bid(&bidder, &CallContext::new("bob"), auction.id, 7, None, &mut OsRng).unwrap();
    let other = create_auction(&bidder, 1);
    assert_eq!(other.id, auction.id + 1);
    assert_eq!(create_auction(&settler, 1).id, other.id + 1);

    clock.advance(HOUR);
    let settled = settler.settle(&CallContext::new("anyone"), auction.id).unwrap();
    assert_eq!(settled.bids.len(), 1);
    assert_eq!(settled.winner().unwrap().identity.as_str(), "bob");

    let ids: Vec<_> = bidder.list_auctions().unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![auction.id, other.id, other.id + 1]);
    assert_eq!(
        bidder.settle(&CallContext::new("late"), auction.id),
        Err(AuctionError::AlreadySettled)
    );
}
