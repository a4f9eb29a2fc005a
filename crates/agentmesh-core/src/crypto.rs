// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Cryptographic primitives: Ed25519 signing/verification and SHA-256
//! hashing.
//!
//! Every other subsystem in this crate goes through these two functions
//! (plus [`did_from_public_key`]) rather than touching `ed25519_dalek` or
//! `sha2` directly, so the primitive choice is swappable in one place.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{AgentMeshError, Result};

/// Raw 32-byte Ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// Raw 64-byte Ed25519 signature.
pub type SignatureBytes = [u8; 64];

/// Parse a raw 32-byte slice into a [`VerifyingKey`].
///
/// Returns [`AgentMeshError::InvalidKey`] if `bytes` is not a valid Ed25519
/// public key (wrong length or not a canonical curve point).
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    let array: PublicKeyBytes = bytes.try_into().map_err(|_| AgentMeshError::InvalidKey)?;
    VerifyingKey::from_bytes(&array).map_err(|_| AgentMeshError::InvalidKey)
}

/// Verify `signature` over `message` against `public_key`.
///
/// Returns [`AgentMeshError::BadSignature`] on any verification failure,
/// including a malformed signature encoding.
pub fn verify(public_key: &VerifyingKey, message: &[u8], signature: &SignatureBytes) -> Result<()> {
    let sig = Signature::from_bytes(signature);
    public_key
        .verify(message, &sig)
        .map_err(|_| AgentMeshError::BadSignature)
}

/// Sign `message` with `signing_key`, returning the raw 64-byte signature.
///
/// Exposed for tests and reference tooling; production callers hold the
/// private key themselves and are never required to route signing through
/// this crate (the core only ever verifies).
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> SignatureBytes {
    signing_key.sign(message).to_bytes()
}

/// SHA-256 digest of `data`, returned as raw bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 digest of `data`, rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive the canonical AgentMesh DID for a public key.
///
/// `did = "did:mesh:" + hex(sha256(pub))[:32]`.
/// Recomputing this from the stored public key must always yield the
/// identity's DID.
pub fn did_from_public_key(public_key: &PublicKeyBytes) -> String {
    let digest_hex = sha256_hex(public_key);
    format!("did:mesh:{}", &digest_hex[..32])
}

/// Concatenate byte-serialisable fields for hashing, in the order callers
/// supply them. This is the crate-wide convention for building the
/// pre-image of a chained hash (delegation links, audit entries): each
/// field is length-prefixed so that e.g. `("ab", "c")` and `("a", "bc")`
/// never collide.
pub fn concat_for_hash(fields: &[&[u8]]) -> Vec<u8> {
    let mut buffer = Vec::new();
    for field in fields {
        buffer.extend_from_slice(&(field.len() as u64).to_le_bytes());
        buffer.extend_from_slice(field);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, VerifyingKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        (signing_key, verifying_key)
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (sk, vk) = keypair();
        let message = b"agentmesh delegation payload";
        let sig = sign(&sk, message);
        assert!(verify(&vk, message, &sig).is_ok());
    }

    #[test]
    fn corrupting_any_byte_flips_verification() {
        let (sk, vk) = keypair();
        let message = b"agentmesh delegation payload";
        let mut sig = sign(&sk, message);
        sig[0] ^= 0xFF;
        assert!(verify(&vk, message, &sig).is_err());
    }

    #[test]
    fn did_derivation_is_deterministic() {
        let (_, vk) = keypair();
        let bytes = vk.to_bytes();
        let did1 = did_from_public_key(&bytes);
        let did2 = did_from_public_key(&bytes);
        assert_eq!(did1, did2);
        assert!(did1.starts_with("did:mesh:"));
        assert_eq!(did1.len(), "did:mesh:".len() + 32);
    }

    #[test]
    fn did_recomputation_matches_suffix() {
        let (_, vk) = keypair();
        let bytes = vk.to_bytes();
        let did = did_from_public_key(&bytes);
        let suffix = &did["did:mesh:".len()..];
        let recomputed = sha256_hex(&bytes);
        assert_eq!(suffix, &recomputed[..32]);
    }

    #[test]
    fn invalid_key_bytes_are_rejected() {
        let bytes = [0u8; 16];
        assert!(parse_public_key(&bytes).is_err());
    }

    #[test]
    fn concat_for_hash_avoids_boundary_collisions() {
        let a = concat_for_hash(&[b"ab", b"c"]);
        let b = concat_for_hash(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }
}
