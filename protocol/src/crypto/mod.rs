//! # Cryptographic Primitives
//!
//! Everything the ledger needs to hash records and to check that an identity
//! controls the address it claims:
//!
//! - **hash** - SHA-256 record digests plus the Bitcoin double-SHA-256 and
//!   HASH160 constructions.
//! - **keys** - secp256k1 wallet keys, P2PKH addresses and WIF import/export.
//! - **message** - Bitcoin signed-message signing and verification.
//!
//! All of it wraps audited crates (`secp256k1`, `sha2`, `ripemd`). Nothing
//! here implements curve arithmetic or hashing by hand.

pub mod hash;
pub mod keys;
pub mod message;

pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{KeyError, Network, P2pkhAddress, WalletKey};
pub use message::{sign_message, signed_message_digest, verify_message, MessageError};
