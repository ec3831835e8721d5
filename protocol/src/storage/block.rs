//! # Block Structure
//!
//! A block is one record of the ledger: a body plus the header fields that
//! place it in the hash chain.
//!
//! ## Layout
//!
//! ```text
//! {
//!   "hash":              sha256 hex of this object with hash = ""
//!   "height":            0, 1, 2, ...
//!   "body":              opaque payload (see body.rs)
//!   "time":              unix seconds at append time
//!   "previousBlockHash": hash of block height-1, "" for genesis
//! }
//! ```
//!
//! ## Hash Computation
//!
//! The hash is SHA-256 over the JSON serialization of the block with `hash`
//! set to the empty string, hex-encoded. Field order is fixed by the struct
//! declaration, so the preimage is deterministic.

use serde::{Deserialize, Serialize};

use super::body::BlockBody;
use crate::config::GENESIS_BODY;
use crate::crypto::hash::sha256_hex;

/// A single ledger record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// SHA-256 hex of the block with this field empty.
    pub hash: String,
    /// Position in the chain (genesis = 0).
    pub height: u64,
    pub body: BlockBody,
    /// Unix timestamp (seconds).
    pub time: u64,
    /// Hash of the block at `height - 1`. Empty for genesis.
    pub previous_block_hash: String,
}

/// Hash preimage: the block's fields in declaration order with `hash`
/// blanked, borrowed so hashing never clones the body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashPreimage<'a> {
    hash: &'a str,
    height: u64,
    body: &'a BlockBody,
    time: u64,
    previous_block_hash: &'a str,
}

impl Block {
    /// A detached block carrying only a body. Height, time and links are
    /// filled in when it is appended.
    pub fn new(body: BlockBody) -> Self {
        Self {
            hash: String::new(),
            height: 0,
            body,
            time: 0,
            previous_block_hash: String::new(),
        }
    }

    /// The unhashed genesis block.
    pub fn genesis(time: u64) -> Self {
        Self {
            time,
            ..Self::new(BlockBody::note(GENESIS_BODY))
        }
    }

    /// JSON bytes the hash is computed over.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&HashPreimage {
            hash: "",
            height: self.height,
            body: &self.body,
            time: self.time,
            previous_block_hash: &self.previous_block_hash,
        })
    }

    /// Recompute the digest of this block, ignoring the stored `hash`.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    /// Set `hash` from the current contents.
    pub fn seal(&mut self) -> Result<(), serde_json::Error> {
        self.hash = self.compute_hash()?;
        Ok(())
    }

    /// Whether the stored hash matches the contents.
    pub fn is_valid(&self) -> bool {
        match self.compute_hash() {
            Ok(digest) => digest == self.hash,
            Err(_) => false,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}
