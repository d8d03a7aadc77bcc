//! Auction persistence.
//!
//! The lifecycle only needs keyed get/put/list with last-write-wins
//! semantics. A read-modify-write is made atomic by the caller: the auction
//! house holds its per-auction lock and the store's [`StoreLock`] from the
//! read until the write lands.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use auction_types::{Auction, AuctionId};

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exclusive access to a store shared with other processes.
///
/// Released on drop.
#[derive(Debug, Default)]
pub struct StoreLock {
    file: Option<File>,
}

impl StoreLock {
    /// Lock for stores that are never shared outside this process.
    pub fn in_process() -> Self {
        Self::default()
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

/// Keyed auction storage.
pub trait AuctionStore: Send + Sync {
    fn get(&self, id: AuctionId) -> Result<Option<Auction>, StoreError>;

    /// Insert or replace the record stored under `auction.id`. Other
    /// records are left as they are.
    fn put(&self, auction: &Auction) -> Result<(), StoreError>;

    /// All records in ascending id order.
    fn list(&self) -> Result<Vec<Auction>, StoreError>;

    fn max_id(&self) -> Result<Option<AuctionId>, StoreError> {
        Ok(self.list()?.last().map(|auction| auction.id))
    }

    /// Block until no other handle on the same backing storage holds the
    /// lock. Stores only reachable from one process need nothing beyond the
    /// house's own locks.
    fn lock(&self) -> Result<StoreLock, StoreError> {
        Ok(StoreLock::in_process())
    }
}

/// In-process store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    auctions: RwLock<BTreeMap<AuctionId, Auction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuctionStore for MemoryStore {
    fn get(&self, id: AuctionId) -> Result<Option<Auction>, StoreError> {
        Ok(self.auctions.read().get(&id).cloned())
    }

    fn put(&self, auction: &Auction) -> Result<(), StoreError> {
        self.auctions.write().insert(auction.id, auction.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Auction>, StoreError> {
        Ok(self.auctions.read().values().cloned().collect())
    }

    fn max_id(&self) -> Result<Option<AuctionId>, StoreError> {
        Ok(self.auctions.read().keys().next_back().copied())
    }
}

/// Store backed by a single JSON file, shareable between processes.
///
/// Nothing is cached: every call reads the file as it is on disk. `put`
/// merges the record into the current contents, writes a sibling temp file
/// and renames it over the original, so a reader never observes a
/// half-written file. Writers serialize on an advisory lock held on a
/// sibling `.lock` file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let auctions = store.load()?;
        debug!(path = %store.path.display(), auctions = auctions.len(), "Opened auction store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<AuctionId, Auction>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read(&self.path)?;
        let records: Vec<Auction> = serde_json::from_slice(&raw)?;
        Ok(records.into_iter().map(|a| (a.id, a)).collect())
    }

    fn persist(&self, auctions: &BTreeMap<AuctionId, Auction>) -> Result<(), StoreError> {
        self.ensure_parent()?;

        let records: Vec<&Auction> = auctions.values().collect();
        let encoded = serde_json::to_vec_pretty(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AuctionStore for JsonFileStore {
    fn get(&self, id: AuctionId) -> Result<Option<Auction>, StoreError> {
        Ok(self.load()?.remove(&id))
    }

    fn put(&self, auction: &Auction) -> Result<(), StoreError> {
        let mut auctions = self.load()?;
        auctions.insert(auction.id, auction.clone());
        self.persist(&auctions)
    }

    fn list(&self) -> Result<Vec<Auction>, StoreError> {
        Ok(self.load()?.into_values().collect())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        Ok(StoreLock { file: Some(file) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::{AuctionStatus, Identity, PublicPoint};

    fn auction(id: AuctionId) -> Auction {
        Auction {
            id,
            creator: Identity::parse("creator").unwrap(),
            item_name: format!("item-{id}"),
            description: String::new(),
            minimum_bid: 1,
            created_at: 0,
            open_until: 1_000,
            evaluator_public: PublicPoint([1u8; 32]),
            bids: vec![],
            status: AuctionStatus::Active,
            outcome: None,
            settled_at: None,
        }
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryStore::new();
        assert!(store.get(1).unwrap().is_none());
        assert_eq!(store.max_id().unwrap(), None);

        store.put(&auction(2)).unwrap();
        store.put(&auction(1)).unwrap();

        let mut updated = auction(2);
        updated.status = AuctionStatus::Cancelled;
        store.put(&updated).unwrap();

        assert_eq!(store.get(2).unwrap().unwrap().status, AuctionStatus::Cancelled);
        let ids: Vec<_> = store.list().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.max_id().unwrap(), Some(2));
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auctions.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.put(&auction(1)).unwrap();
            store.put(&auction(3)).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 2);
        assert_eq!(reopened.get(3).unwrap().unwrap().item_name, "item-3");
        assert_eq!(reopened.max_id().unwrap(), Some(3));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auctions.json");
        fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_store_handles_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auctions.json");

        let first = JsonFileStore::open(&path).unwrap();
        first.put(&auction(1)).unwrap();

        let second = JsonFileStore::open(&path).unwrap();
        let mut cancelled = auction(1);
        cancelled.status = AuctionStatus::Cancelled;
        second.put(&cancelled).unwrap();
        second.put(&auction(2)).unwrap();

        assert_eq!(first.get(1).unwrap().unwrap().status, AuctionStatus::Cancelled);
        assert_eq!(first.max_id().unwrap(), Some(2));

        first.put(&auction(3)).unwrap();
        let ids: Vec<_> = second.list().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(second.get(1).unwrap().unwrap().status, AuctionStatus::Cancelled);
    }

    #[test]
    fn test_json_store_lock_is_exclusive_across_handles() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auctions.json");
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();
        let acquired = AtomicBool::new(false);

        let held = first.lock().unwrap();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let _lock = second.lock().unwrap();
                acquired.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(100));
            assert!(!acquired.load(Ordering::SeqCst));
            drop(held);
        });
        assert!(acquired.load(Ordering::SeqCst));
    }
}
