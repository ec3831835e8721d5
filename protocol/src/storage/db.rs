//! # ChainStore - Persistent Record Storage
//!
//! The persistence layer for the ledger, built on sled's embedded key-value
//! store. Every read and write of a record goes through this module; nothing
//! else holds a handle to the database.
//!
//! ## Tree Layout
//!
//! | Tree     | Key                        | Value          |
//! |----------|----------------------------|----------------|
//! | `blocks` | `height` as decimal string | `json(Block)`  |
//!
//! Keys are decimal strings, so sled's lexicographic order is NOT numeric
//! order (`"10" < "2"`). Ordered reads decode the height and sort.
//!
//! ## Atomicity
//!
//! New records are written with `compare_and_swap` against an absent key:
//! either the height was free and the record lands, or someone else already
//! owns it and nothing is written. Plain `put` overwrites and exists only for
//! recovery tooling.

use sled::{Db, Tree};
use std::path::Path;
use tracing::error;

use super::block::Block;
use crate::config::BLOCKS_TREE;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no record at height {0}")]
    NotFound(u64),

    #[error("corrupt record under key {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("write failed: {0}")]
    WriteFailure(String),

    #[error("height {0} is already taken")]
    HeightTaken(u64),

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// ChainStore
// ---------------------------------------------------------------------------

/// Key-value persistence for records, keyed by height.
///
/// sled is thread-safe, so a `ChainStore` can be shared behind an `Arc`
/// without extra locking. Ordering between appends is the engine's job.
#[derive(Debug, Clone)]
pub struct ChainStore {
    db: Db,
    blocks: Tree,
}

impl ChainStore {
    /// Open or create a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that is deleted when dropped. Used by tests and benchmarks.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let blocks = db.open_tree(BLOCKS_TREE)?;
        Ok(Self { db, blocks })
    }

    // -- Reads --------------------------------------------------------------

    /// Fetch the record at `height`.
    pub fn get(&self, height: u64) -> StoreResult<Block> {
        let key = height_key(height);
        match self.blocks.get(key.as_bytes())? {
            Some(bytes) => decode(&key, &bytes),
            None => Err(StoreError::NotFound(height)),
        }
    }

    /// Number of stored records. sled counts by iterating the tree.
    pub fn count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Lowest-height record matching `predicate`.
    ///
    /// sled iterates in byte order, so the whole tree is scanned and the
    /// minimum height among matches is kept.
    pub fn find_first<F>(&self, predicate: F) -> StoreResult<Option<Block>>
    where
        F: Fn(&Block) -> bool,
    {
        let mut best: Option<(u64, Block)> = None;
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let key = key_string(&key);
            let height = parse_height(&key)?;
            let block = decode(&key, &value)?;
            let lower = best.as_ref().map_or(true, |(found, _)| height < *found);
            if lower && predicate(&block) {
                best = Some((height, block));
            }
        }
        Ok(best.map(|(_, block)| block))
    }

    /// Every record matching `predicate`, ordered by height.
    pub fn find_all<F>(&self, predicate: F) -> StoreResult<Vec<Block>>
    where
        F: Fn(&Block) -> bool,
    {
        let mut matches = Vec::new();
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let key = key_string(&key);
            let height = parse_height(&key)?;
            let block = decode(&key, &value)?;
            if predicate(&block) {
                matches.push((height, block));
            }
        }
        matches.sort_by_key(|(height, _)| *height);
        Ok(matches.into_iter().map(|(_, block)| block).collect())
    }

    /// All records with their storage heights, ordered by height.
    ///
    /// The height comes from the key, not the record, so a record whose
    /// `height` field was altered still shows up where it is stored.
    pub fn scan_all(&self) -> StoreResult<Vec<(u64, Block)>> {
        let mut records = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let key = key_string(&key);
            let height = parse_height(&key)?;
            records.push((height, decode(&key, &value)?));
        }
        records.sort_by_key(|(height, _)| *height);
        Ok(records)
    }

    // -- Writes -------------------------------------------------------------

    /// Store `block` at `height` only if the height is free.
    ///
    /// Returns `HeightTaken` when another writer got there first; the
    /// existing record is left untouched.
    pub fn insert_new(&self, height: u64, block: &Block) -> StoreResult<()> {
        let key = height_key(height);
        let bytes = encode(block)?;
        self.blocks
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?
            .map_err(|_| StoreError::HeightTaken(height))?;
        self.flush()
    }

    /// Overwrite the record at `height` unconditionally.
    ///
    /// Recovery and tamper-testing only. Request handling must never reach
    /// this; appends go through [`ChainStore::insert_new`].
    pub fn put(&self, height: u64, block: &Block) -> StoreResult<()> {
        let key = height_key(height);
        let bytes = encode(block)?;
        self.blocks
            .insert(key.as_bytes(), bytes)
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?;
        self.flush()
    }

    /// Write raw bytes under a height key, bypassing encoding. Recovery and
    /// corruption testing only.
    pub fn put_raw(&self, height: u64, bytes: &[u8]) -> StoreResult<()> {
        self.blocks
            .insert(height_key(height).as_bytes(), bytes)
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?;
        self.flush()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn height_key(height: u64) -> String {
    height.to_string()
}

fn key_string(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

fn parse_height(key: &str) -> StoreResult<u64> {
    key.parse().map_err(|_| {
        error!(key, "non-numeric key in blocks tree");
        StoreError::CorruptRecord {
            key: key.to_string(),
            reason: "key is not a decimal height".into(),
        }
    })
}

fn encode(block: &Block) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(block).map_err(|e| StoreError::WriteFailure(e.to_string()))
}

fn decode(key: &str, bytes: &[u8]) -> StoreResult<Block> {
    serde_json::from_slice(bytes).map_err(|e| {
        error!(key, error = %e, "failed to decode stored record");
        StoreError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}
