//! # Storage Module
//!
//! The ledger proper: record structure, persistence, and the engine that
//! links records into a hash chain.
//!
//! ## Architecture
//!
//! ```text
//! body.rs   - record payloads (notes, star registrations), story encoding
//! block.rs  - record structure, canonical serialization, hash/verify
//! db.rs     - sled persistence keyed by decimal height
//! chain.rs  - append, lookups, genesis, whole-chain validation
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! StarSubmission ─► BlockBody ─► ChainEngine::append ─► Block ─► ChainStore
//!                                                                 (blocks)
//! ```
//!
//! Records are stored as JSON in the same field order that is
//! hashed, so a record read straight out of sled can be re-verified without
//! any translation.

pub mod block;
pub mod body;
pub mod chain;
pub mod db;

pub use block::Block;
pub use body::{BlockBody, BodyError, Star, StarDraft, StarRegistration, StarSubmission};
pub use chain::{ChainEngine, ChainError, ChainFault, ChainResult, ChainValidation};
pub use db::{ChainStore, StoreError, StoreResult};
