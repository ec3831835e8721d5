//! # Hashing Utilities
//!
//! The ledger needs exactly three digests:
//!
//! - **SHA-256** - record hashes. Hex-encoded, this is the `hash` and
//!   `previousBlockHash` of every block.
//! - **double SHA-256** - the Bitcoin signed-message digest that wallet
//!   signatures commit to.
//! - **HASH160** (`RIPEMD-160(SHA-256(x))`) - the public key hash inside a
//!   P2PKH address.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use notary_protocol::crypto::sha256;
///
/// let hash = sha256(b"notary");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 of the input as a lowercase hex string. This is the digest format
/// stored in records.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute `RIPEMD-160(SHA-256(data))`, the hash committed to by P2PKH
/// addresses.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    let mut output = [0u8; 20];
    output.copy_from_slice(&hasher.finalize());
    output
}
