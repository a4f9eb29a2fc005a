// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Short-lived credentials issued to an agent identity for use on the wire.
//!
//! A [`Credential`] is a signed, time-boxed attestation that a given DID
//! currently holds a given capability set — distinct from a
//! [`crate::delegation::DelegationLink`] in that it carries no issuer chain
//! of its own, it simply restates what the identity (or its delegation
//! chain) already grants, with a short TTL so a leaked credential has a
//! bounded blast radius.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, SignatureBytes};
use crate::error::{AgentMeshError, Result};
use crate::identity::IdentityRegistry;
use crate::storage::Storage;

/// A signed, time-boxed capability attestation for a single agent DID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub subject_did: String,
    pub capabilities: BTreeSet<String>,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
    /// Signature over the credential fields, by the identity's own key.
    pub signature: SignatureBytes,
}

impl Credential {
    fn preimage(subject_did: &str, capabilities: &BTreeSet<String>, issued_at_ms: u64, expires_at_ms: u64) -> Vec<u8> {
        let caps_joined = capabilities.iter().cloned().collect::<Vec<_>>().join(",");
        crypto::concat_for_hash(&[
            subject_did.as_bytes(),
            caps_joined.as_bytes(),
            issued_at_ms.to_le_bytes().as_slice(),
            expires_at_ms.to_le_bytes().as_slice(),
        ])
    }

    /// Has this credential's expiry passed as of `now_ms`?
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Is `now_ms` within `rotation_lead_ms` of expiry, i.e. should a caller
    /// holding this credential proactively rotate it?
    pub fn needs_rotation(&self, now_ms: u64, rotation_lead_ms: u64) -> bool {
        now_ms + rotation_lead_ms >= self.expires_at_ms
    }
}

/// Issue a new credential for `subject_did`, attesting `capabilities` for
/// `ttl_ms` milliseconds starting at `now_ms`.
///
/// The identity must be registered and active, and `capabilities` must be a
/// subset of its declared capabilities (checked via
/// [`crate::capability::is_subset`]).
pub fn issue<S: Storage>(
    registry: &IdentityRegistry<S>,
    signing_key: &SigningKey,
    subject_did: &str,
    capabilities: BTreeSet<String>,
    now_ms: u64,
    ttl_ms: u64,
) -> Result<Credential> {
    let identity = registry.get(subject_did).ok_or(AgentMeshError::UnknownAgent)?;
    if !identity.is_active() {
        return Err(AgentMeshError::Revoked);
    }
    if !crate::capability::is_subset(&capabilities, &identity.capabilities) {
        return Err(AgentMeshError::CapabilityEscalation {
            requested: capabilities.iter().cloned().collect::<Vec<_>>().join(","),
            allowed: identity.capabilities.iter().cloned().collect::<Vec<_>>().join(","),
        });
    }

    let expires_at_ms = now_ms + ttl_ms;
    let preimage = Credential::preimage(subject_did, &capabilities, now_ms, expires_at_ms);
    let signature = crypto::sign(signing_key, &preimage);

    Ok(Credential {
        subject_did: subject_did.to_string(),
        capabilities,
        issued_at_ms: now_ms,
        expires_at_ms,
        signature,
    })
}

/// Verify `credential` against the identity registered for its subject,
/// rejecting it if expired, revoked, or incorrectly signed.
pub fn verify<S: Storage>(registry: &IdentityRegistry<S>, credential: &Credential, now_ms: u64) -> Result<()> {
    if credential.is_expired(now_ms) {
        return Err(AgentMeshError::Expired);
    }
    let identity = registry.get(&credential.subject_did).ok_or(AgentMeshError::UnknownAgent)?;
    if !identity.is_active() {
        return Err(AgentMeshError::Revoked);
    }
    let verifying_key = crypto::parse_public_key(&identity.public_key)?;
    let preimage = Credential::preimage(
        &credential.subject_did,
        &credential.capabilities,
        credential.issued_at_ms,
        credential.expires_at_ms,
    );
    crypto::verify(&verifying_key, &preimage, &credential.signature)
}

/// Re-issue `credential` with the same subject and capabilities but a fresh
/// validity window, if it is within `rotation_lead_ms` of expiring.
///
/// Returns `Ok(None)` when rotation is not yet due.
pub fn rotate_if_due<S: Storage>(
    registry: &IdentityRegistry<S>,
    signing_key: &SigningKey,
    credential: &Credential,
    now_ms: u64,
    ttl_ms: u64,
    rotation_lead_ms: u64,
) -> Result<Option<Credential>> {
    if !credential.needs_rotation(now_ms, rotation_lead_ms) {
        return Ok(None);
    }
    let rotated = issue(
        registry,
        signing_key,
        &credential.subject_did,
        credential.capabilities.clone(),
        now_ms,
        ttl_ms,
    )?;
    Ok(Some(rotated))
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

    fn setup() -> (IdentityRegistry<InMemoryStorage>, SigningKey, String) {
        let mut registry = IdentityRegistry::new(InMemoryStorage::new());
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = registry
            .register(signing_key.verifying_key().as_bytes(), None, caps(&["read:data"]), 0)
            .unwrap();
        (registry, signing_key, did)
    }

    #[test]
    fn issued_credential_verifies() {
        let (registry, signing_key, did) = setup();
        let credential = issue(&registry, &signing_key, &did, caps(&["read:data"]), 0, 60_000).unwrap();
        assert!(verify(&registry, &credential, 1_000).is_ok());
    }

    #[test]
    fn expired_credential_is_rejected() {
        let (registry, signing_key, did) = setup();
        let credential = issue(&registry, &signing_key, &did, caps(&["read:data"]), 0, 1_000).unwrap();
        let result = verify(&registry, &credential, 2_000);
        assert_eq!(result, Err(AgentMeshError::Expired));
    }

    #[test]
    fn escalating_capabilities_is_rejected() {
        let (registry, signing_key, did) = setup();
        let result = issue(&registry, &signing_key, &did, caps(&["read:data", "delete:data"]), 0, 60_000);
        assert!(matches!(result, Err(AgentMeshError::CapabilityEscalation { .. })));
    }

    #[test]
    fn revoked_identity_credential_is_rejected() {
        let (mut registry, signing_key, did) = setup();
        let credential = issue(&registry, &signing_key, &did, caps(&["read:data"]), 0, 60_000).unwrap();
        registry.revoke(&did, "compromised");
        let result = verify(&registry, &credential, 1_000);
        assert_eq!(result, Err(AgentMeshError::Revoked));
    }

    #[test]
    fn rotation_is_skipped_before_lead_window() {
        let (registry, signing_key, did) = setup();
        let credential = issue(&registry, &signing_key, &did, caps(&["read:data"]), 0, 100_000).unwrap();
        let result = rotate_if_due(&registry, &signing_key, &credential, 1_000, 100_000, 5_000).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn rotation_triggers_inside_lead_window() {
        let (registry, signing_key, did) = setup();
        let credential = issue(&registry, &signing_key, &did, caps(&["read:data"]), 0, 10_000).unwrap();
        let result = rotate_if_due(&registry, &signing_key, &credential, 9_000, 10_000, 5_000).unwrap();
        assert!(result.is_some());
        let rotated = result.unwrap();
        assert_eq!(rotated.subject_did, did);
        assert_eq!(rotated.expires_at_ms, 19_000);
    }
}
