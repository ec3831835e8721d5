//! # Notary Protocol - Core Library
//!
//! A single-node, append-only ledger whose records form a tamper-evident
//! hash chain, and a write-admission gate in front of it: an identity may
//! only add a record after proving, with a Bitcoin wallet signature, that it
//! controls the address it claims, and only within a bounded time window.
//!
//! ## Architecture
//!
//! - **crypto** - SHA-256 / HASH160 digests, secp256k1 wallet keys, and
//!   Bitcoin signed-message verification.
//! - **storage** - record structure, sled-backed `ChainStore`, and the
//!   `ChainEngine` that appends, links and validates records.
//! - **admission** - the per-identity request / validate / consume state
//!   machine that gates appends.
//! - **config** - protocol constants.
//!
//! ## Typical Flow
//!
//! ```text
//! request_challenge(addr) ─► wallet signs "addr:ts:starRegistry"
//!      ─► validate_signature(addr, sig) ─► take_authorization(addr)
//!      ─► ChainEngine::append(body)
//! ```
//!
//! Replication, peer discovery and consensus are out of scope: there is one
//! writer and one copy of the chain.

pub mod admission;
pub mod config;
pub mod crypto;
pub mod storage;

pub use admission::{
    AdmissionConfig, AdmissionController, AdmissionEntry, AdmissionError, AdmissionState,
    ValidationResult,
};
pub use storage::{Block, BlockBody, ChainEngine, ChainError, ChainStore, ChainValidation};
