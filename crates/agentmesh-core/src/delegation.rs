// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Delegation chains: one agent granting a narrowed capability set to
//! another, hash-linked and signed link by link.
//!
//! A chain is rooted either at a known human sponsor or at an
//! already-registered identity. Each link must:
//!
//! * be signed by its issuer's key
//! * declare a capability set that is a subset of the issuer's own
//!   (enforced via [`crate::capability::is_subset`])
//! * chain its `prev_hash` to the previous link's `hash`
//! * not push the chain past `max_depth`
//!
//! [`DelegationChain::verify`] re-derives every hash and signature from
//! scratch; nothing about a link is trusted just because it was accepted
//! once.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::capability;
use crate::crypto::{self, SignatureBytes};
use crate::error::{AgentMeshError, Result};
use crate::identity::IdentityRegistry;
use crate::storage::Storage;

/// A single signed grant from `issuer_did` to `subject_did`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationLink {
    pub issuer_did: String,
    pub subject_did: String,
    pub capabilities: BTreeSet<String>,
    /// Unix epoch milliseconds after which this link is no longer valid.
    pub expires_at_ms: u64,
    /// Hash of the previous link in the chain, or `"genesis"` for the root.
    pub prev_hash: String,
    /// Hash of this link, computed over every field above plus `prev_hash`.
    pub hash: String,
    /// Issuer's signature over `hash`.
    pub signature: SignatureBytes,
}

impl DelegationLink {
    fn compute_hash(
        issuer_did: &str,
        subject_did: &str,
        capabilities: &BTreeSet<String>,
        expires_at_ms: u64,
        prev_hash: &str,
    ) -> String {
        let caps_joined = capabilities.iter().cloned().collect::<Vec<_>>().join(",");
        let preimage = crypto::concat_for_hash(&[
            issuer_did.as_bytes(),
            subject_did.as_bytes(),
            caps_joined.as_bytes(),
            expires_at_ms.to_le_bytes().as_slice(),
            prev_hash.as_bytes(),
        ]);
        crypto::sha256_hex(&preimage)
    }

    /// Has this link's expiry passed as of `now_ms`?
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// An ordered sequence of [`DelegationLink`]s rooted at a sponsor or
/// pre-registered identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationChain {
    pub links: Vec<DelegationLink>,
}

impl DelegationChain {
    /// An empty chain (no delegation has occurred; the acting identity is
    /// its own authority).
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Number of links issued so far.
    pub fn depth(&self) -> u32 {
        self.links.len() as u32
    }

    /// The capability set actually usable at the end of the chain: the
    /// last link's declared set, since every link is required to narrow
    /// relative to its predecessor.
    pub fn effective_capabilities(&self) -> BTreeSet<String> {
        self.links
            .last()
            .map(|link| link.capabilities.clone())
            .unwrap_or_default()
    }

    /// Sign and append a new link delegating `capabilities` from `issuer`
    /// to `subject_did`.
    ///
    /// `issuer_signing_key` must correspond to the public key on record for
    /// `issuer_did`, and `issuer_capabilities` must be the capability set
    /// the issuer is currently entitled to grant from (its own declared
    /// capabilities, or the chain's current effective set when extending an
    /// existing chain).
    ///
    /// # Errors
    ///
    /// * [`AgentMeshError::DepthExceeded`] if appending would exceed `max_depth`.
    /// * [`AgentMeshError::CapabilityEscalation`] if `capabilities` is not a
    ///   subset of `issuer_capabilities`.
    pub fn delegate(
        &mut self,
        issuer_did: &str,
        issuer_signing_key: &SigningKey,
        issuer_capabilities: &BTreeSet<String>,
        subject_did: &str,
        capabilities: BTreeSet<String>,
        expires_at_ms: u64,
        max_depth: u32,
    ) -> Result<()> {
        if self.depth() + 1 > max_depth {
            return Err(AgentMeshError::DepthExceeded {
                depth: self.depth() + 1,
                max: max_depth,
            });
        }
        if !capability::is_subset(&capabilities, issuer_capabilities) {
            return Err(AgentMeshError::CapabilityEscalation {
                requested: capabilities.iter().cloned().collect::<Vec<_>>().join(","),
                allowed: issuer_capabilities.iter().cloned().collect::<Vec<_>>().join(","),
            });
        }

        let prev_hash = self
            .links
            .last()
            .map(|link| link.hash.clone())
            .unwrap_or_else(|| "genesis".to_string());

        let hash = DelegationLink::compute_hash(
            issuer_did,
            subject_did,
            &capabilities,
            expires_at_ms,
            &prev_hash,
        );
        let signature = crypto::sign(issuer_signing_key, hash.as_bytes());

        self.links.push(DelegationLink {
            issuer_did: issuer_did.into(),
            subject_did: subject_did.into(),
            capabilities,
            expires_at_ms,
            prev_hash,
            hash,
            signature,
        });
        Ok(())
    }

    /// Verify every link's hash, signature, capability narrowing, and
    /// depth, and confirm the chain roots at a known sponsor.
    ///
    /// Returns the effective capability set together with the DID of the
    /// sponsor the chain is rooted at. An empty chain has no root link and
    /// reports an empty sponsor DID.
    pub fn verify<S: Storage>(
        &self,
        registry: &IdentityRegistry<S>,
        max_depth: u32,
        now_ms: u64,
    ) -> Result<(BTreeSet<String>, String)> {
        if self.depth() > max_depth {
            return Err(AgentMeshError::DepthExceeded {
                depth: self.depth(),
                max: max_depth,
            });
        }

        let mut prev_hash = "genesis".to_string();
        let mut prev_capabilities: Option<BTreeSet<String>> = None;

        for link in &self.links {
            if link.prev_hash != prev_hash {
                return Err(AgentMeshError::BrokenChain);
            }
            let expected_hash = DelegationLink::compute_hash(
                &link.issuer_did,
                &link.subject_did,
                &link.capabilities,
                link.expires_at_ms,
                &link.prev_hash,
            );
            if expected_hash != link.hash {
                return Err(AgentMeshError::BrokenChain);
            }
            if link.is_expired(now_ms) {
                return Err(AgentMeshError::Expired);
            }

            let issuer = registry.get(&link.issuer_did).ok_or(AgentMeshError::UnknownAgent)?;
            if !issuer.is_active() {
                return Err(AgentMeshError::Revoked);
            }
            let verifying_key: VerifyingKey = crypto::parse_public_key(&issuer.public_key)?;
            crypto::verify(&verifying_key, link.hash.as_bytes(), &link.signature)?;

            let issuer_authority = prev_capabilities.clone().unwrap_or_else(|| issuer.capabilities.clone());
            if !capability::is_subset(&link.capabilities, &issuer_authority) {
                return Err(AgentMeshError::CapabilityEscalation {
                    requested: link.capabilities.iter().cloned().collect::<Vec<_>>().join(","),
                    allowed: issuer_authority.iter().cloned().collect::<Vec<_>>().join(","),
                });
            }

            prev_hash = link.hash.clone();
            prev_capabilities = Some(link.capabilities.clone());
        }

        let root_sponsor = match self.links.first() {
            Some(root_link) => {
                // Every link in the loop above, including this one, is
                // already confirmed to belong to a registered, active
                // identity — that's a precondition for issuing at all, not
                // evidence of sponsorship. Whether the root issuer is a
                // *sponsor* is a separate fact recorded independently
                // whenever some identity names it as `sponsor` at
                // registration time.
                if !registry.is_known_sponsor(&root_link.issuer_did) {
                    return Err(AgentMeshError::UnknownSponsor);
                }
                root_link.issuer_did.clone()
            }
            None => String::new(),
        };

        Ok((self.effective_capabilities(), root_sponsor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use alloc::string::ToString;
    use rand::rngs::OsRng;

    fn caps(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    /// Registers a root identity, then registers a second, unrelated
    /// identity naming the root's own DID as its sponsor — the only way
    /// `is_known_sponsor` can become true for a DID, since sponsorship is
    /// recorded as a freeform string whenever *any* registration names it.
    fn setup() -> (IdentityRegistry<InMemoryStorage>, SigningKey, String) {
        let mut registry = IdentityRegistry::new(InMemoryStorage::new());
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = registry
            .register(
                signing_key.verifying_key().as_bytes(),
                Some("alice"),
                caps(&["*"]),
                0,
            )
            .unwrap();
        let sponsored_key = SigningKey::generate(&mut OsRng);
        registry
            .register(sponsored_key.verifying_key().as_bytes(), Some(did.as_str()), caps(&["read:data"]), 0)
            .unwrap();
        (registry, signing_key, did)
    }

    #[test]
    fn single_link_chain_verifies() {
        let (registry, signing_key, did) = setup();
        let mut chain = DelegationChain::new();
        chain
            .delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["read:data"]), 1_000_000, 5)
            .unwrap();
        let (effective, root_sponsor) = chain.verify(&registry, 5, 0).unwrap();
        assert_eq!(effective, caps(&["read:data"]));
        assert_eq!(root_sponsor, did);
    }

    #[test]
    fn widening_delegation_is_rejected() {
        let (_, signing_key, did) = setup();
        let mut chain = DelegationChain::new();
        let result = chain.delegate(
            &did,
            &signing_key,
            &caps(&["read:data"]),
            "did:mesh:bob",
            caps(&["read:data", "write:data"]),
            1_000_000,
            5,
        );
        assert!(matches!(result, Err(AgentMeshError::CapabilityEscalation { .. })));
    }

    #[test]
    fn depth_exceeding_max_is_rejected() {
        let (_, signing_key, did) = setup();
        let mut chain = DelegationChain::new();
        let result = chain.delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["*"]), 1_000_000, 0);
        assert!(matches!(result, Err(AgentMeshError::DepthExceeded { .. })));
    }

    #[test]
    fn tampered_link_breaks_verification() {
        let (registry, signing_key, did) = setup();
        let mut chain = DelegationChain::new();
        chain
            .delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["read:data"]), 1_000_000, 5)
            .unwrap();
        chain.links[0].capabilities = caps(&["read:data", "write:data"]);
        let result = chain.verify(&registry, 5, 0);
        assert!(result.is_err());
    }

    #[test]
    fn expired_link_is_rejected() {
        let (registry, signing_key, did) = setup();
        let mut chain = DelegationChain::new();
        chain
            .delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["read:data"]), 100, 5)
            .unwrap();
        let result = chain.verify(&registry, 5, 1_000_000);
        assert_eq!(result, Err(AgentMeshError::Expired));
    }

    #[test]
    fn revoked_root_is_rejected() {
        let mut registry = IdentityRegistry::new(InMemoryStorage::new());
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = registry
            .register(signing_key.verifying_key().as_bytes(), None, caps(&["*"]), 0)
            .unwrap();
        registry.revoke(&did, "test");
        let mut chain = DelegationChain::new();
        chain
            .delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["read:data"]), 1_000_000, 5)
            .unwrap();
        let result = chain.verify(&registry, 5, 0);
        assert_eq!(result, Err(AgentMeshError::Revoked));
    }

    #[test]
    fn unknown_sponsor_root_is_rejected() {
        // An active, registered root that no other identity has ever named
        // as its sponsor must be rejected by the sponsor check itself, not
        // by the earlier registration/revocation checks.
        let mut registry = IdentityRegistry::new(InMemoryStorage::new());
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = registry
            .register(signing_key.verifying_key().as_bytes(), None, caps(&["*"]), 0)
            .unwrap();
        let mut chain = DelegationChain::new();
        chain
            .delegate(&did, &signing_key, &caps(&["*"]), "did:mesh:bob", caps(&["read:data"]), 1_000_000, 5)
            .unwrap();
        let result = chain.verify(&registry, 5, 0);
        assert_eq!(result, Err(AgentMeshError::UnknownSponsor));
    }
}
