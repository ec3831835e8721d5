//! # Protocol Configuration & Constants
//!
//! Every magic number the ledger depends on lives here: the admission
//! window, the challenge tag, payload limits, and the Bitcoin version bytes
//! used when parsing addresses and keys.
//!
//! Changing the protocol tag or the genesis text after a ledger has been
//! initialized changes what existing identities must sign and what the
//! genesis record hashes to. Treat them as frozen once data exists.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Ledger format version reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Length of the admission window in seconds. A challenge can be signed, and
/// a validated challenge consumed, until `requested_at + window`.
pub const VALIDATION_WINDOW_SECS: u64 = 300;

/// Suffix appended to every challenge message:
/// `<address>:<requested_at>:<tag>`.
pub const PROTOCOL_TAG: &str = "starRegistry";

/// How often the node sweeps expired admission entries. Expiry is also
/// checked on every access, so this only bounds memory held by abandoned
/// requests.
pub const ADMISSION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Body stored in the genesis record.
pub const GENESIS_BODY: &str = "First Block Genesis Block";

/// Maximum length of a hex-encoded star story (two hex chars per byte).
pub const MAX_STORY_HEX_LENGTH: usize = 500;

/// Name of the sled tree holding records keyed by decimal height.
pub const BLOCKS_TREE: &str = "blocks";

// ---------------------------------------------------------------------------
// Bitcoin Encoding
// ---------------------------------------------------------------------------

/// Prefix of the Bitcoin signed-message digest. The leading byte is the
/// length of the remaining text (24).
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Base58Check version byte of a mainnet P2PKH address.
pub const P2PKH_VERSION_MAINNET: u8 = 0x00;

/// Base58Check version byte of a testnet P2PKH address.
pub const P2PKH_VERSION_TESTNET: u8 = 0x6f;

/// Base58Check version byte of a mainnet WIF private key.
pub const WIF_VERSION_MAINNET: u8 = 0x80;

/// Base58Check version byte of a testnet WIF private key.
pub const WIF_VERSION_TESTNET: u8 = 0xef;

/// Length of a compact recoverable signature: header byte + r + s.
pub const COMPACT_SIGNATURE_LENGTH: usize = 65;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Current Unix time in whole seconds.
///
/// Clamped at zero so a clock set before 1970 cannot wrap into the far
/// future.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
