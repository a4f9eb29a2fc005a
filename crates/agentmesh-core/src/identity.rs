// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Identity registration and revocation.
//!
//! [`IdentityRegistry`] is responsible for three operations:
//!
//! * [`register`](IdentityRegistry::register) — derive a DID from a public
//!   key and record the identity (idempotent on a known key)
//! * [`get`](IdentityRegistry::get) — look up an identity by DID
//! * [`revoke`](IdentityRegistry::revoke) — mark an identity revoked,
//!   idempotently
//!
//! Delegation (`delegate`, `verify_chain`) lives in [`crate::delegation`];
//! credential issuance and rotation live in [`crate::credential`]. Both
//! borrow [`IdentityRegistry`] to resolve public keys and check status.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, PublicKeyBytes};
use crate::error::{AgentMeshError, Result};
use crate::storage::Storage;

/// Lifecycle status of a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    Active,
    Suspended,
    Revoked,
}

/// A registered agent identity.
///
/// The DID is derived deterministically from the public key; the private
/// key never leaves the agent process and is never represented in this
/// struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// `did:mesh:<32 lowercase hex chars>`, derived from `public_key`.
    pub did: String,
    /// Raw 32-byte Ed25519 public key.
    pub public_key: PublicKeyBytes,
    /// Human sponsor that vouches for this identity, if any.
    pub sponsor: Option<String>,
    /// Unix epoch milliseconds at which the identity was registered.
    pub created_at_ms: u64,
    /// Current lifecycle status.
    pub status: IdentityStatus,
    /// Declared capability set (wildcard tokens allowed).
    pub capabilities: BTreeSet<String>,
}

impl Identity {
    /// Is this identity currently usable (not revoked)?
    pub fn is_active(&self) -> bool {
        !matches!(self.status, IdentityStatus::Revoked)
    }
}

/// Manages identity registration, lookup, and revocation.
pub struct IdentityRegistry<S: Storage> {
    storage: S,
}

impl<S: Storage> IdentityRegistry<S> {
    /// Create a new [`IdentityRegistry`] over `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Register a new identity, or return the existing DID if `public_key`
    /// is already known.
    ///
    /// `sponsor`, when present, is recorded both on the identity and as a
    /// known sponsor usable as a delegation chain root.
    ///
    /// # Errors
    ///
    /// Returns [`AgentMeshError::InvalidKey`] if `public_key` is not a
    /// well-formed Ed25519 public key.
    pub fn register(
        &mut self,
        public_key: &[u8],
        sponsor: Option<&str>,
        capabilities: BTreeSet<String>,
        now_ms: u64,
    ) -> Result<String> {
        // Validate before deriving the DID so a malformed key never gets a
        // DID minted for it.
        crypto::parse_public_key(public_key)?;
        let key_array: PublicKeyBytes = public_key.try_into().map_err(|_| AgentMeshError::InvalidKey)?;
        let did = crypto::did_from_public_key(&key_array);

        if let Some(existing) = self.storage.get_identity(&did) {
            return Ok(existing.did);
        }

        if let Some(sponsor) = sponsor {
            self.storage.register_sponsor(sponsor);
        }

        let identity = Identity {
            did: did.clone(),
            public_key: key_array,
            sponsor: sponsor.map(Into::into),
            created_at_ms: now_ms,
            status: IdentityStatus::Active,
            capabilities,
        };
        self.storage.set_identity(&did, identity);
        Ok(did)
    }

    /// Look up an identity by DID.
    pub fn get(&self, did: &str) -> Option<Identity> {
        self.storage.get_identity(did)
    }

    /// Is `did` a registered identity that is currently active?
    pub fn is_active(&self, did: &str) -> bool {
        self.get(did).map(|identity| identity.is_active()).unwrap_or(false)
    }

    /// Revoke the identity registered for `did`. Idempotent: revoking an
    /// already-revoked or unknown identity is not an error.
    ///
    /// All credentials and outgoing delegations issued by `did` become
    /// invalid for *future* verifications; already-open sessions are a
    /// transport concern outside this crate's scope.
    pub fn revoke(&mut self, did: &str, _reason: &str) {
        if let Some(mut identity) = self.storage.get_identity(did) {
            identity.status = IdentityStatus::Revoked;
            self.storage.set_identity(did, identity);
        }
    }

    /// Is `sponsor` a known human sponsor (registered via [`register`](Self::register))?
    pub fn is_known_sponsor(&self, sponsor: &str) -> bool {
        self.storage.is_known_sponsor(sponsor)
    }

    /// Return every registered identity. Used by delegation chain
    /// verification to resolve an issuer's public key.
    pub fn all(&self) -> Vec<Identity> {
        self.storage.all_identities()
    }

    /// Borrow the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrow the underlying storage.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
