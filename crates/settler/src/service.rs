//! Settlement service implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use auction_module::{due_for_settlement, AuctionHouse, CallContext};
use auction_types::AuctionId;

/// Configuration for the settlement service.
#[derive(Debug, Clone)]
pub struct SettlerConfig {
    /// Identity recorded as the settling caller
    pub identity: String,
    /// Polling interval in seconds
    pub poll_interval_secs: u64,
}

impl Default for SettlerConfig {
    fn default() -> Self {
        Self {
            identity: "settler".to_string(),
            poll_interval_secs: 10,
        }
    }
}

/// Outcome of one sweep over due auctions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Settled with a winner
    pub sold: Vec<AuctionId>,
    /// Settled without a winner
    pub unsold: Vec<AuctionId>,
    /// Already settled, or being settled, by another caller
    pub skipped: Vec<AuctionId>,
    /// Left unsettled because of an error; retried on the next sweep
    pub failed: Vec<AuctionId>,
}

impl SweepReport {
    pub fn settled(&self) -> usize {
        self.sold.len() + self.unsold.len()
    }
}

/// The settlement service.
pub struct SettlementService {
    house: Arc<AuctionHouse>,
    config: SettlerConfig,
}

impl SettlementService {
    /// Create a new settlement service.
    pub fn new(house: Arc<AuctionHouse>, config: SettlerConfig) -> Self {
        Self { house, config }
    }

    /// Settle every auction that is due right now.
    pub fn run_once(&self) -> Result<SweepReport> {
        let ctx = CallContext::new(self.config.identity.clone());
        let due = due_for_settlement(&self.house, self.house.now())?;
        let mut report = SweepReport::default();

        for auction_id in due {
            match self.house.settle(&ctx, auction_id) {
                Ok(auction) if auction.winner().is_some() => report.sold.push(auction_id),
                Ok(_) => report.unsold.push(auction_id),
                Err(err) if err.is_settlement_decided() => {
                    debug!(auction_id, "Settled elsewhere, skipping");
                    report.skipped.push(auction_id);
                }
                Err(err) => {
                    warn!(auction_id, error = %err, "Settlement failed");
                    report.failed.push(auction_id);
                }
            }
        }

        if report != SweepReport::default() {
            info!(
                sold = report.sold.len(),
                unsold = report.unsold.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Settlement sweep complete"
            );
        }
        Ok(report)
    }

    /// Start the settlement service.
    ///
    /// Sweeps on every tick until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "Starting settlement service"
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let service = self.clone();
                    match tokio::task::spawn_blocking(move || service.run_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("Settlement sweep failed: {}", e),
                        Err(e) => error!("Settlement sweep panicked: {}", e),
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Settlement service shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::seal_for_recipient;
    use auction_evaluator::LocalEvaluator;
    use auction_module::{CreateAuction, ManualClock, MemoryStore};
    use rand::rngs::OsRng;

    const HOUR: u64 = 60 * 60 * 1000;

    fn setup() -> (Arc<AuctionHouse>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10 * HOUR));
        let house = AuctionHouse::builder(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalEvaluator::generate(&mut OsRng)),
        )
        .clock(clock.clone())
        .build()
        .unwrap();
        (Arc::new(house), clock)
    }

    fn create(house: &AuctionHouse, open_for: u64) -> AuctionId {
        house
            .create_auction(
                &CallContext::new("alice"),
                CreateAuction {
                    item_name: "Bike".to_string(),
                    description: String::new(),
                    minimum_bid: 1,
                    open_until: house.now() + open_for,
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_settler_config_default() {
        let config = SettlerConfig::default();
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.identity, "settler");
    }

    #[test]
    fn test_run_once_settles_due_auctions() {
        let (house, clock) = setup();
        let with_bid = create(&house, HOUR);
        let empty = create(&house, HOUR);
        let later = create(&house, 5 * HOUR);

        let sealed = seal_for_recipient(40, &house.evaluator_public(), &mut OsRng).unwrap();
        house
            .submit_bid(&CallContext::new("bob"), with_bid, sealed, None)
            .unwrap();

        let service = SettlementService::new(house.clone(), SettlerConfig::default());
        assert_eq!(service.run_once().unwrap(), SweepReport::default());

        clock.advance(HOUR);
        let report = service.run_once().unwrap();
        assert_eq!(report.sold, vec![with_bid]);
        assert_eq!(report.unsold, vec![empty]);
        assert_eq!(report.settled(), 2);

        assert_eq!(house.get_auction(with_bid).unwrap().winner().unwrap().amount, 40);
        assert!(house.get_auction(later).unwrap().outcome.is_none());
        assert_eq!(service.run_once().unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_start_stops_on_shutdown() {
        let (house, clock) = setup();
        let auction_id = create(&house, HOUR);
        clock.advance(HOUR);

        let service = Arc::new(SettlementService::new(
            house.clone(),
            SettlerConfig {
                identity: "sweeper".to_string(),
                poll_interval_secs: 1,
            },
        ));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(service.start(rx));

        // The first tick fires immediately.
        for _ in 0..100 {
            if house.get_auction(auction_id).unwrap().settled_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(house.get_auction(auction_id).unwrap().settled_at.is_some());

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
