//! # Wallet Keys and Addresses
//!
//! secp256k1 key handling for the identities that sign admission
//! challenges. Identities are plain Bitcoin P2PKH addresses, so this module
//! speaks the Bitcoin encodings: Base58Check addresses and WIF private
//! keys, each in a mainnet and a testnet flavour.
//!
//! Key bytes are never logged. `WalletKey` redacts itself in `Debug`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::hash160;
use crate::config::{
    P2PKH_VERSION_MAINNET, P2PKH_VERSION_TESTNET, WIF_VERSION_MAINNET, WIF_VERSION_TESTNET,
};

/// Errors from parsing or constructing keys and addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid base58check encoding")]
    InvalidEncoding,

    #[error("unknown version byte 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("unexpected payload length {0}")]
    InvalidLength(usize),

    #[error("invalid secret key")]
    InvalidSecretKey,
}

/// Shared secp256k1 context. Building one precomputes tables, so it is done
/// once per process.
pub(crate) fn secp() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Bitcoin network an address or key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Base58Check version byte for P2PKH addresses.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => P2PKH_VERSION_MAINNET,
            Network::Testnet => P2PKH_VERSION_TESTNET,
        }
    }

    /// Base58Check version byte for WIF private keys.
    pub fn wif_version(self) -> u8 {
        match self {
            Network::Mainnet => WIF_VERSION_MAINNET,
            Network::Testnet => WIF_VERSION_TESTNET,
        }
    }

    fn from_p2pkh_version(version: u8) -> Result<Self, KeyError> {
        match version {
            P2PKH_VERSION_MAINNET => Ok(Network::Mainnet),
            P2PKH_VERSION_TESTNET => Ok(Network::Testnet),
            other => Err(KeyError::UnknownVersion(other)),
        }
    }

    fn from_wif_version(version: u8) -> Result<Self, KeyError> {
        match version {
            WIF_VERSION_MAINNET => Ok(Network::Mainnet),
            WIF_VERSION_TESTNET => Ok(Network::Testnet),
            other => Err(KeyError::UnknownVersion(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// P2PKH Address
// ---------------------------------------------------------------------------

/// A pay-to-public-key-hash address: a network plus the HASH160 of a
/// serialized public key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct P2pkhAddress {
    network: Network,
    pubkey_hash: [u8; 20],
}

impl P2pkhAddress {
    /// Derive the address for a serialized (33- or 65-byte) public key.
    pub fn from_public_key(public_key: &[u8], network: Network) -> Self {
        Self {
            network,
            pubkey_hash: hash160(public_key),
        }
    }

    /// Parse a Base58Check P2PKH address.
    pub fn parse(address: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(address)
            .with_check(None)
            .into_vec()
            .map_err(|_| KeyError::InvalidEncoding)?;

        if bytes.len() != 21 {
            return Err(KeyError::InvalidLength(bytes.len()));
        }

        let network = Network::from_p2pkh_version(bytes[0])?;
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&bytes[1..]);
        Ok(Self {
            network,
            pubkey_hash,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The 20-byte HASH160 this address commits to.
    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }
}

impl fmt::Display for P2pkhAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.p2pkh_version());
        payload.extend_from_slice(&self.pubkey_hash);
        f.write_str(&bs58::encode(payload).with_check().into_string())
    }
}

impl FromStr for P2pkhAddress {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// WalletKey
// ---------------------------------------------------------------------------

/// A secp256k1 private key together with the serialization flags that
/// determine its address: compressed or uncompressed public key, mainnet or
/// testnet.
///
/// Intentionally not `Serialize`. Export goes through [`WalletKey::to_wif`].
#[derive(Clone)]
pub struct WalletKey {
    secret: SecretKey,
    compressed: bool,
    network: Network,
}

impl WalletKey {
    /// Generate a fresh compressed key from the thread RNG.
    pub fn generate(network: Network) -> Self {
        let secret = SecretKey::new(&mut secp256k1::rand::thread_rng());
        Self {
            secret,
            compressed: true,
            network,
        }
    }

    /// Build a key from a raw 32-byte scalar.
    pub fn from_secret_bytes(
        bytes: &[u8; 32],
        compressed: bool,
        network: Network,
    ) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self {
            secret,
            compressed,
            network,
        })
    }

    /// Decode a Wallet Import Format string.
    ///
    /// A 33-byte payload is an uncompressed key; 34 bytes with a trailing
    /// `0x01` marks a compressed key.
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(wif.trim())
            .with_check(None)
            .into_vec()
            .map_err(|_| KeyError::InvalidEncoding)?;

        let compressed = match bytes.len() {
            33 => false,
            34 if bytes[33] == 0x01 => true,
            other => return Err(KeyError::InvalidLength(other)),
        };

        let network = Network::from_wif_version(bytes[0])?;
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&bytes[1..33]);
        Self::from_secret_bytes(&scalar, compressed, network)
    }

    /// Encode as Wallet Import Format.
    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(self.network.wif_version());
        payload.extend_from_slice(&self.secret.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        bs58::encode(payload).with_check().into_string()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(secp(), &self.secret)
    }

    /// Public key serialized the way this key's address commits to it.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let public_key = self.public_key();
        if self.compressed {
            public_key.serialize().to_vec()
        } else {
            public_key.serialize_uncompressed().to_vec()
        }
    }

    pub fn p2pkh_address(&self) -> P2pkhAddress {
        P2pkhAddress::from_public_key(&self.public_key_bytes(), self.network)
    }

    /// The Base58Check address string identities are keyed by.
    pub fn address(&self) -> String {
        self.p2pkh_address().to_string()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("address", &self.address())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_one() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes
    }

    #[test]
    fn compressed_key_one_matches_known_address() {
        let key = WalletKey::from_secret_bytes(&scalar_one(), true, Network::Mainnet).unwrap();
        assert_eq!(key.address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(
            key.to_wif(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn uncompressed_key_one_matches_known_address() {
        let key = WalletKey::from_secret_bytes(&scalar_one(), false, Network::Mainnet).unwrap();
        assert_eq!(key.address(), "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm");
        assert_eq!(
            key.to_wif(),
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf"
        );
    }

    #[test]
    fn wif_import_restores_flags() {
        let key = WalletKey::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf")
            .unwrap();
        assert!(!key.is_compressed());
        assert_eq!(key.network(), Network::Mainnet);
        assert_eq!(key.secret_key().secret_bytes(), scalar_one());
    }

    #[test]
    fn testnet_address_uses_testnet_prefix() {
        let key = WalletKey::generate(Network::Testnet);
        let address = key.address();
        assert!(address.starts_with('m') || address.starts_with('n'));
        let parsed = P2pkhAddress::parse(&address).unwrap();
        assert_eq!(parsed.network(), Network::Testnet);
    }

    #[test]
    fn zero_scalar_is_rejected() {
        let err = WalletKey::from_secret_bytes(&[0u8; 32], true, Network::Mainnet).unwrap_err();
        assert_eq!(err, KeyError::InvalidSecretKey);
    }

    #[test]
    fn address_with_bad_checksum_is_rejected() {
        let err = P2pkhAddress::parse("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMA").unwrap_err();
        assert_eq!(err, KeyError::InvalidEncoding);
    }

    #[test]
    fn address_round_trips_through_display() {
        let key = WalletKey::generate(Network::Mainnet);
        let parsed: P2pkhAddress = key.address().parse().unwrap();
        assert_eq!(parsed, key.p2pkh_address());
        assert_eq!(parsed.to_string(), key.address());
    }

    #[test]
    fn debug_output_hides_secret() {
        let key = WalletKey::from_secret_bytes(&scalar_one(), true, Network::Mainnet).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert!(!rendered.contains(&hex::encode(scalar_one())));
    }
}
