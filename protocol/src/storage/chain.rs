//! # Chain Engine
//!
//! Builds, links, hashes, appends and validates records on top of a
//! [`ChainStore`]. The engine is the only writer: it owns genesis creation
//! and the append path, and it is the only code that decides a record's
//! height and previous hash.
//!
//! ## Append
//!
//! ```text
//! lock ─► h = count() ─► prev = get(h-1).hash ─► seal ─► insert_new(h) ─► unlock
//! ```
//!
//! The in-process lock serializes appends from this engine. The store's
//! compare-and-swap catches anything the lock cannot see (another process on
//! the same directory, a recovery tool), turning a lost race into
//! `ConcurrentAppendConflict` instead of an overwrite.
//!
//! ## Validation
//!
//! One pass in height order. Each record is checked against its own hash
//! and against the predecessor already checked in the same pass. The first
//! failure stops the pass and is reported with its height.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::block::Block;
use super::body::BlockBody;
use super::db::{ChainStore, StoreError};
use crate::config::unix_now;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors surfaced by the chain engine.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("corrupt record under key {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("height {0} was claimed by a concurrent append")]
    ConcurrentAppendConflict(u64),

    #[error("write failed: {0}")]
    WriteFailure(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;

impl From<StoreError> for ChainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(height) => ChainError::NotFound(format!("height {height}")),
            StoreError::CorruptRecord { key, reason } => ChainError::CorruptRecord { key, reason },
            StoreError::WriteFailure(reason) => ChainError::WriteFailure(reason),
            StoreError::HeightTaken(height) => ChainError::ConcurrentAppendConflict(height),
            StoreError::Backend(e) => ChainError::Backend(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation Report
// ---------------------------------------------------------------------------

/// Why a record failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFault {
    /// Stored hash does not match the record's contents.
    HashMismatch,
    /// `previousBlockHash` does not match the predecessor (or is non-empty
    /// on genesis).
    BrokenLink,
    /// No record is stored at this height although later ones exist.
    HeightGap,
    /// The record's own `height` disagrees with the key it is stored under.
    MisplacedRecord,
}

/// Outcome of [`ChainEngine::validate_chain`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainValidation {
    pub valid: bool,
    pub first_bad_height: Option<u64>,
    pub fault: Option<ChainFault>,
    /// Records examined, including the failing one.
    pub checked: u64,
}

impl ChainValidation {
    fn ok(checked: u64) -> Self {
        Self {
            valid: true,
            first_bad_height: None,
            fault: None,
            checked,
        }
    }

    fn failed(height: u64, fault: ChainFault, checked: u64) -> Self {
        Self {
            valid: false,
            first_bad_height: Some(height),
            fault: Some(fault),
            checked,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainEngine
// ---------------------------------------------------------------------------

/// The ledger: a hash-linked sequence of records persisted in a
/// [`ChainStore`].
#[derive(Debug)]
pub struct ChainEngine {
    store: ChainStore,
    append_lock: Mutex<()>,
}

impl ChainEngine {
    /// Wrap a store without touching it. The chain may be empty.
    pub fn new(store: ChainStore) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
        }
    }

    /// Wrap a store and make sure it has a genesis record.
    pub fn open(store: ChainStore) -> ChainResult<Self> {
        let engine = Self::new(store);
        engine.ensure_genesis()?;
        Ok(engine)
    }

    /// Create the genesis record if height 0 is empty.
    ///
    /// Returns `true` when a record was written. Safe to call on every
    /// startup and from several processes at once.
    pub fn ensure_genesis(&self) -> ChainResult<bool> {
        let _guard = self.append_lock.lock();

        match self.store.get(0) {
            Ok(_) => {
                debug!("genesis already present");
                return Ok(false);
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let mut genesis = Block::genesis(unix_now());
        genesis.seal()?;

        match self.store.insert_new(0, &genesis) {
            Ok(()) => {
                info!(hash = %genesis.hash, "created genesis record");
                Ok(true)
            }
            Err(StoreError::HeightTaken(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of records, which is also the height the next append gets.
    pub fn height(&self) -> u64 {
        self.store.count()
    }

    /// Append a record stamped with the current time.
    pub fn append(&self, body: BlockBody) -> ChainResult<Block> {
        self.append_at(body, unix_now())
    }

    /// Append a record with an explicit timestamp.
    pub fn append_at(&self, body: BlockBody, time: u64) -> ChainResult<Block> {
        let _guard = self.append_lock.lock();

        let height = self.store.count();
        let previous_block_hash = if height == 0 {
            String::new()
        } else {
            self.store.get(height - 1)?.hash
        };

        let mut block = Block {
            height,
            time,
            previous_block_hash,
            ..Block::new(body)
        };
        block.seal()?;

        self.store.insert_new(height, &block).map_err(|e| {
            if matches!(e, StoreError::HeightTaken(_)) {
                warn!(height, "append lost race for height");
            }
            ChainError::from(e)
        })?;

        info!(height, hash = %block.hash, "appended record");
        Ok(block)
    }

    // -- Lookups ------------------------------------------------------------

    pub fn get_by_height(&self, height: u64) -> ChainResult<Block> {
        Ok(self.store.get(height)?)
    }

    pub fn get_by_hash(&self, hash: &str) -> ChainResult<Block> {
        self.store
            .find_first(|block| block.hash == hash)?
            .ok_or_else(|| ChainError::NotFound(format!("hash {hash}")))
    }

    /// First record matching an arbitrary predicate.
    pub fn find_first<F>(&self, predicate: F) -> ChainResult<Block>
    where
        F: Fn(&Block) -> bool,
    {
        self.store
            .find_first(predicate)?
            .ok_or_else(|| ChainError::NotFound("matching record".into()))
    }

    /// All records whose body belongs to `identity`, in height order. An
    /// identity with no records yields an empty list.
    pub fn find_by_identity(&self, identity: &str) -> ChainResult<Vec<Block>> {
        Ok(self
            .store
            .find_all(|block| block.body.identity() == Some(identity))?)
    }

    // -- Validation ---------------------------------------------------------

    /// Whether the record at `height` matches its own hash.
    pub fn validate_block(&self, height: u64) -> ChainResult<bool> {
        Ok(self.store.get(height)?.is_valid())
    }

    /// Check every record's hash and link, in height order.
    pub fn validate_chain(&self) -> ChainResult<ChainValidation> {
        let records = self.store.scan_all()?;
        let mut previous_hash: Option<&str> = None;
        let mut checked = 0u64;

        for (expected, (stored_at, block)) in (0u64..).zip(records.iter()) {
            checked += 1;

            let fault = if *stored_at != expected {
                Some((expected, ChainFault::HeightGap))
            } else if block.height != expected {
                Some((expected, ChainFault::MisplacedRecord))
            } else if !block.is_valid() {
                Some((expected, ChainFault::HashMismatch))
            } else if block.previous_block_hash != previous_hash.unwrap_or("") {
                Some((expected, ChainFault::BrokenLink))
            } else {
                None
            };

            if let Some((height, fault)) = fault {
                warn!(height, ?fault, "chain validation failed");
                return Ok(ChainValidation::failed(height, fault, checked));
            }

            previous_hash = Some(block.hash.as_str());
        }

        debug!(checked, "chain validated");
        Ok(ChainValidation::ok(checked))
    }

    /// The underlying store, for recovery tooling.
    pub fn store(&self) -> &ChainStore {
        &self.store
    }
}
