//! # Write Admission
//!
//! Per-identity state machine that decides who may append right now.
//!
//! ```text
//!            request_challenge          validate_signature (ok)
//!  Absent ───────────────────► Pending ───────────────────────► Validated
//!    ▲                            │                                │
//!    │        expiry              │            consume             │
//!    └────────────────────────────┴────────────────────────────────┘
//! ```
//!
//! An identity asks for a challenge, signs it with the wallet behind its
//! address, and then has until the end of the window to spend the resulting
//! authorization on exactly one append.
//!
//! ## Concurrency
//!
//! Entries live in a `DashMap` keyed by identity. Every transition is a
//! single map operation (`entry`, `remove_if`, or a `get_mut` that re-checks
//! the entry it read), so two requests for the same identity cannot both
//! consume one authorization. Signature verification runs without holding a
//! shard lock.
//!
//! Expiry is checked on every access. [`AdmissionController::purge_expired`]
//! additionally drops abandoned entries in bulk.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{PROTOCOL_TAG, VALIDATION_WINDOW_SECS};
use crate::crypto::message::verify_message;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable admission parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Seconds between requesting a challenge and the authorization lapsing.
    pub window_secs: u64,
    /// Suffix of every challenge message.
    pub protocol_tag: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_secs: VALIDATION_WINDOW_SECS,
            protocol_tag: PROTOCOL_TAG.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionState {
    Pending,
    Validated,
}

/// The live admission record of one identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionEntry {
    pub identity: String,
    pub requested_at: u64,
    /// `identity:requested_at:tag`, the exact text the wallet must sign.
    pub challenge_message: String,
    pub state: AdmissionState,
    pub expires_at: u64,
}

impl AdmissionEntry {
    fn new(identity: &str, now: u64, config: &AdmissionConfig) -> Self {
        Self {
            identity: identity.to_string(),
            requested_at: now,
            challenge_message: format!("{identity}:{now}:{}", config.protocol_tag),
            state: AdmissionState::Pending,
            expires_at: now.saturating_add(config.window_secs),
        }
    }

    pub fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }

    /// Seconds left in the window, zero once expired.
    pub fn remaining_window(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

/// Outcome of a signature check that could be carried out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub remaining_window: u64,
    /// The entry after the check: `Validated` on success, unchanged otherwise.
    pub entry: AdmissionEntry,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("no live validation window for {identity}, request a new challenge")]
    WindowExpired { identity: String },

    #[error("{identity} has not validated a challenge signature")]
    NotAuthorized { identity: String },

    #[error("signature could not be checked: {0}")]
    SignatureInvalid(String),
}

// ---------------------------------------------------------------------------
// AdmissionController
// ---------------------------------------------------------------------------

/// Owns every admission entry. One instance per node, shared behind an
/// `Arc`.
#[derive(Debug, Default)]
pub struct AdmissionController {
    config: AdmissionConfig,
    entries: DashMap<String, AdmissionEntry>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Start, or return the still-live, challenge for `identity`.
    pub fn request_challenge(&self, identity: &str, now: u64) -> AdmissionEntry {
        match self.entries.entry(identity.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return occupied.get().clone();
                }
                let fresh = AdmissionEntry::new(identity, now, &self.config);
                occupied.insert(fresh.clone());
                debug!(identity, requested_at = now, "replaced expired challenge");
                fresh
            }
            Entry::Vacant(vacant) => {
                let fresh = AdmissionEntry::new(identity, now, &self.config);
                vacant.insert(fresh.clone());
                debug!(identity, requested_at = now, "issued challenge");
                fresh
            }
        }
    }

    /// Check `signature` against the identity's challenge message.
    ///
    /// A signature that parses but was made by a different key returns
    /// `valid: false` and leaves the entry as it was, so the caller can retry
    /// within the window.
    pub fn validate_signature(
        &self,
        identity: &str,
        signature: &str,
        now: u64,
    ) -> Result<ValidationResult, AdmissionError> {
        let snapshot = self
            .live_entry(identity, now)
            .ok_or_else(|| window_expired(identity))?;

        let verified = verify_message(&snapshot.challenge_message, identity, signature)
            .map_err(|e| AdmissionError::SignatureInvalid(e.to_string()))?;

        if !verified {
            debug!(identity, "challenge signature rejected");
            return Ok(ValidationResult {
                valid: false,
                remaining_window: snapshot.remaining_window(now),
                entry: snapshot,
            });
        }

        // Only promote the entry that was verified. If it expired or was
        // replaced meanwhile, the signature covers a stale challenge.
        let mut current = self
            .entries
            .get_mut(identity)
            .ok_or_else(|| window_expired(identity))?;
        if current.requested_at != snapshot.requested_at || !current.is_live(now) {
            return Err(window_expired(identity));
        }
        current.state = AdmissionState::Validated;
        let entry = current.value().clone();
        drop(current);

        debug!(identity, "challenge signature validated");
        Ok(ValidationResult {
            valid: true,
            remaining_window: entry.remaining_window(now),
            entry,
        })
    }

    /// Remove and return the identity's authorization if it is validated
    /// and live.
    pub fn take_authorization(
        &self,
        identity: &str,
        now: u64,
    ) -> Result<AdmissionEntry, AdmissionError> {
        if self.expire(identity, now) {
            return Err(window_expired(identity));
        }

        self.entries
            .remove_if(identity, |_, entry| {
                entry.state == AdmissionState::Validated && entry.is_live(now)
            })
            .map(|(_, entry)| {
                debug!(identity, "authorization consumed");
                entry
            })
            .ok_or_else(|| AdmissionError::NotAuthorized {
                identity: identity.to_string(),
            })
    }

    /// `true` exactly once per successful validation.
    pub fn consume_if_authorized(&self, identity: &str, now: u64) -> bool {
        self.take_authorization(identity, now).is_ok()
    }

    /// Put back an authorization taken for an append that then failed.
    ///
    /// Refused when the entry has expired or the identity already holds a
    /// newer one.
    pub fn reinstate(&self, entry: AdmissionEntry, now: u64) -> bool {
        if !entry.is_live(now) {
            return false;
        }
        match self.entries.entry(entry.identity.clone()) {
            Entry::Vacant(vacant) => {
                debug!(identity = %entry.identity, "authorization reinstated");
                vacant.insert(entry);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Drop the identity's entry if its window has closed. Returns whether
    /// anything was removed.
    pub fn expire(&self, identity: &str, now: u64) -> bool {
        self.entries
            .remove_if(identity, |_, entry| !entry.is_live(now))
            .is_some()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            debug!(removed, "purged expired admissions");
        }
        removed
    }

    /// The identity's live entry, if any.
    pub fn get(&self, identity: &str, now: u64) -> Option<AdmissionEntry> {
        self.live_entry(identity, now)
    }

    /// Entries currently held, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_entry(&self, identity: &str, now: u64) -> Option<AdmissionEntry> {
        self.expire(identity, now);
        self.entries.get(identity).map(|entry| entry.value().clone())
    }
}

fn window_expired(identity: &str) -> AdmissionError {
    AdmissionError::WindowExpired {
        identity: identity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{Network, WalletKey};
    use crate::crypto::message::sign_message;

    const WINDOW: u64 = 300;

    fn controller() -> AdmissionController {
        AdmissionController::new(AdmissionConfig::default())
    }

    fn validated(controller: &AdmissionController, key: &WalletKey, now: u64) -> AdmissionEntry {
        let entry = controller.request_challenge(&key.address(), now);
        let signature = sign_message(key, &entry.challenge_message);
        let result = controller
            .validate_signature(&key.address(), &signature, now + 1)
            .unwrap();
        assert!(result.valid);
        result.entry
    }

    #[test]
    fn challenge_message_format_and_window() {
        let entry = controller().request_challenge("addr1", 1000);
        assert_eq!(entry.challenge_message, "addr1:1000:starRegistry");
        assert_eq!(entry.expires_at, 1300);
        assert_eq!(entry.state, AdmissionState::Pending);
        assert_eq!(entry.remaining_window(1100), 200);
        assert_eq!(entry.remaining_window(1400), 0);
    }

    #[test]
    fn rerequest_within_window_is_idempotent() {
        let controller = controller();
        let first = controller.request_challenge("addr1", 1000);
        let second = controller.request_challenge("addr1", 1001);
        assert_eq!(first, second);
        assert_eq!(controller.len(), 1);
    }

    #[test]
    fn rerequest_after_expiry_issues_new_challenge() {
        let controller = controller();
        let first = controller.request_challenge("addr1", 1000);
        let second = controller.request_challenge("addr1", 1000 + WINDOW);
        assert_ne!(first.challenge_message, second.challenge_message);
        assert_eq!(second.requested_at, 1300);
    }

    #[test]
    fn validation_after_window_is_expired() {
        let controller = controller();
        controller.request_challenge("addr1", 1000);
        let err = controller
            .validate_signature("addr1", "irrelevant", 1301)
            .unwrap_err();
        assert_eq!(
            err,
            AdmissionError::WindowExpired {
                identity: "addr1".into()
            }
        );
        assert!(controller.is_empty(), "expired entry is removed on access");
    }

    #[test]
    fn validation_at_expiry_instant_is_expired() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        let entry = controller.request_challenge(&key.address(), 1000);
        let signature = sign_message(&key, &entry.challenge_message);

        let err = controller
            .validate_signature(&key.address(), &signature, 1300)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WindowExpired { .. }));
        assert!(controller.is_empty());
    }

    #[test]
    fn validation_one_second_before_expiry_succeeds() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        let entry = controller.request_challenge(&key.address(), 1000);
        let signature = sign_message(&key, &entry.challenge_message);

        let result = controller
            .validate_signature(&key.address(), &signature, 1299)
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.remaining_window, 1);
    }

    #[test]
    fn validation_without_request_is_expired() {
        let err = controller()
            .validate_signature("addr1", "irrelevant", 1)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WindowExpired { .. }));
    }

    #[test]
    fn valid_signature_promotes_entry() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        let entry = controller.request_challenge(&key.address(), 1000);
        let signature = sign_message(&key, &entry.challenge_message);

        let result = controller
            .validate_signature(&key.address(), &signature, 1100)
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.remaining_window, 200);
        assert_eq!(result.entry.state, AdmissionState::Validated);
        assert_eq!(
            controller.get(&key.address(), 1100).unwrap().state,
            AdmissionState::Validated
        );
    }

    #[test]
    fn wrong_signer_leaves_entry_pending() {
        let controller = controller();
        let owner = WalletKey::generate(Network::Mainnet);
        let intruder = WalletKey::generate(Network::Mainnet);
        let entry = controller.request_challenge(&owner.address(), 1000);
        let forged = sign_message(&intruder, &entry.challenge_message);

        let result = controller
            .validate_signature(&owner.address(), &forged, 1010)
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.entry.state, AdmissionState::Pending);
        assert!(!controller.consume_if_authorized(&owner.address(), 1011));
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        controller.request_challenge(&key.address(), 1000);
        let err = controller
            .validate_signature(&key.address(), "@@@", 1001)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::SignatureInvalid(_)));
        assert_eq!(
            controller.get(&key.address(), 1001).unwrap().state,
            AdmissionState::Pending
        );
    }

    #[test]
    fn authorization_is_consumed_exactly_once() {
        let controller = controller();
        let key = WalletKey::generate(Network::Testnet);
        let address = key.address();

        controller.request_challenge(&address, 1000);
        assert!(!controller.consume_if_authorized(&address, 1001));

        validated(&controller, &key, 1000);
        assert!(controller.consume_if_authorized(&address, 1002));
        assert!(!controller.consume_if_authorized(&address, 1003));
        assert!(controller.get(&address, 1003).is_none());
    }

    #[test]
    fn validated_entry_expires_too() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        validated(&controller, &key, 1000);

        let err = controller
            .take_authorization(&key.address(), 1300)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WindowExpired { .. }));
    }

    #[test]
    fn absent_identity_is_not_authorized() {
        let err = controller().take_authorization("nobody", 5).unwrap_err();
        assert_eq!(
            err,
            AdmissionError::NotAuthorized {
                identity: "nobody".into()
            }
        );
    }

    #[test]
    fn reinstate_restores_taken_authorization() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        validated(&controller, &key, 1000);

        let taken = controller.take_authorization(&key.address(), 1002).unwrap();
        assert!(controller.reinstate(taken.clone(), 1003));
        assert!(controller.consume_if_authorized(&key.address(), 1004));

        // Expired entries and superseded identities are not restored.
        assert!(!controller.reinstate(taken.clone(), 1300));
        controller.request_challenge(&key.address(), 1005);
        assert!(!controller.reinstate(taken, 1006));
        assert_eq!(
            controller.get(&key.address(), 1006).unwrap().state,
            AdmissionState::Pending
        );
    }

    #[test]
    fn signature_over_replaced_challenge_is_refused() {
        let controller = controller();
        let key = WalletKey::generate(Network::Mainnet);
        let old = controller.request_challenge(&key.address(), 1000);
        let stale_signature = sign_message(&key, &old.challenge_message);

        controller.request_challenge(&key.address(), 1400);
        let result = controller
            .validate_signature(&key.address(), &stale_signature, 1401)
            .unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn expire_and_purge() {
        let controller = controller();
        controller.request_challenge("a", 1000);
        controller.request_challenge("b", 1100);
        controller.request_challenge("c", 1200);

        assert!(!controller.expire("a", 1299));
        assert!(controller.expire("a", 1300));
        assert_eq!(controller.purge_expired(1450), 1);
        assert_eq!(controller.len(), 1);
        assert!(controller.get("c", 1450).is_some());
    }

    #[test]
    fn custom_window_and_tag() {
        let controller = AdmissionController::new(AdmissionConfig {
            window_secs: 10,
            protocol_tag: "notary".into(),
        });
        let entry = controller.request_challenge("id", 50);
        assert_eq!(entry.challenge_message, "id:50:notary");
        assert_eq!(entry.expires_at, 60);
    }
}
