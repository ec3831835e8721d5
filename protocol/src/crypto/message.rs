//! # Bitcoin Signed Messages
//!
//! Identities prove control of an address by signing the admission challenge
//! with the wallet that owns it, in the format produced by `signmessage` in
//! Bitcoin Core and by most wallets:
//!
//! ```text
//! digest    = SHA256d( "\x18Bitcoin Signed Message:\n" || varint(len) || message )
//! signature = base64( header || r || s )          header = 27 + recid (+4 if compressed)
//! ```
//!
//! Verification recovers the public key from the signature, hashes it in the
//! serialization the header announces, and compares the result with the
//! address's pubkey hash. Only P2PKH addresses are accepted; segwit header
//! bytes (35 and above) are rejected as malformed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;
use thiserror::Error;

use super::hash::{double_sha256, hash160};
use super::keys::{secp, KeyError, P2pkhAddress, WalletKey};
use crate::config::{COMPACT_SIGNATURE_LENGTH, SIGNED_MESSAGE_PREFIX};

/// Header byte of the first (uncompressed, recid 0) compact signature.
const HEADER_BASE: u8 = 27;

/// Header byte of the last P2PKH compact signature (compressed, recid 3).
const HEADER_MAX: u8 = 34;

/// Reasons a signature or address could not even be checked.
///
/// A well-formed signature that simply does not match the address is not an
/// error; [`verify_message`] returns `Ok(false)` for it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("signature is not valid base64")]
    InvalidEncoding,

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("unsupported signature header byte {0}")]
    InvalidHeader(u8),

    #[error("malformed signature")]
    MalformedSignature,

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] KeyError),
}

/// Compute the digest a wallet signs for `message`.
pub fn signed_message_digest(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let mut preimage = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 9 + bytes.len());
    preimage.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    write_varint(&mut preimage, bytes.len() as u64);
    preimage.extend_from_slice(bytes);
    double_sha256(&preimage)
}

/// Bitcoin CompactSize encoding.
fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Sign `message` with `key`, producing the base64 compact signature a
/// wallet would return.
pub fn sign_message(key: &WalletKey, message: &str) -> String {
    let digest = Message::from_digest(signed_message_digest(message));
    let signature = secp().sign_ecdsa_recoverable(&digest, key.secret_key());
    let (recovery_id, compact) = signature.serialize_compact();

    let mut header = HEADER_BASE + recovery_id.to_i32() as u8;
    if key.is_compressed() {
        header += 4;
    }

    let mut encoded = Vec::with_capacity(COMPACT_SIGNATURE_LENGTH);
    encoded.push(header);
    encoded.extend_from_slice(&compact);
    STANDARD.encode(encoded)
}

/// Check that `signature` over `message` was produced by the key behind
/// `address`.
///
/// Returns `Ok(false)` when everything parses but the recovered key does not
/// belong to the address. Malformed input is an error.
pub fn verify_message(message: &str, address: &str, signature: &str) -> Result<bool, MessageError> {
    let address = P2pkhAddress::parse(address)?;

    let raw = STANDARD
        .decode(signature.trim())
        .map_err(|_| MessageError::InvalidEncoding)?;
    if raw.len() != COMPACT_SIGNATURE_LENGTH {
        return Err(MessageError::InvalidLength(raw.len()));
    }

    let header = raw[0];
    if !(HEADER_BASE..=HEADER_MAX).contains(&header) {
        return Err(MessageError::InvalidHeader(header));
    }
    let compressed = header >= HEADER_BASE + 4;
    let recovery_id = RecoveryId::from_i32(i32::from((header - HEADER_BASE) & 3))
        .map_err(|_| MessageError::InvalidHeader(header))?;

    let recoverable = RecoverableSignature::from_compact(&raw[1..], recovery_id)
        .map_err(|_| MessageError::MalformedSignature)?;

    let digest = Message::from_digest(signed_message_digest(message));
    let public_key = match secp().recover_ecdsa(&digest, &recoverable) {
        Ok(key) => key,
        // r/s parse fine but describe no point on the curve for this digest.
        Err(_) => return Ok(false),
    };

    let recovered_hash = if compressed {
        hash160(&public_key.serialize())
    } else {
        hash160(&public_key.serialize_uncompressed())
    };

    Ok(&recovered_hash == address.pubkey_hash())
}
