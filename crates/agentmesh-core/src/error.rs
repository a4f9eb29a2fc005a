// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Error kinds shared across every governance subsystem.
//!
//! [`AgentMeshError`] is the single error type returned by fallible public
//! operations. Structural violations (bad signatures, broken chains,
//! invalid policy documents) are surfaced to the caller and never retried
//! internally.

use alloc::string::String;
use core::fmt;

/// Unified error type for every fallible operation in this crate.
///
/// `Display` is implemented by hand (no derive macro) to match the style of
/// [`crate::config_loader::ConfigError`] and to keep the crate usable in
/// `no_std` builds where derive-based error crates typically pull in `std`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMeshError {
    /// A supplied public key is malformed (wrong length or not a valid
    /// curve point).
    InvalidKey,
    /// The referenced agent has no registered identity.
    UnknownAgent,
    /// An attempted capability set is not a subset of the granting set.
    CapabilityEscalation { requested: String, allowed: String },
    /// A delegation chain would exceed the configured maximum depth.
    DepthExceeded { depth: u32, max: u32 },
    /// A credential or delegation link's expiry has passed.
    Expired,
    /// The identity has been revoked and can no longer act.
    Revoked,
    /// A signature failed to verify against the claimed issuer's key.
    BadSignature,
    /// A delegation chain's hash linkage does not match the expected
    /// previous-link hash.
    BrokenChain,
    /// A chain's root issuer is not a registered human sponsor.
    UnknownSponsor,
    /// A policy document failed schema validation or condition parsing.
    PolicyInvalid(String),
    /// An action was denied by an active rate limit.
    RateLimited,
    /// Policy evaluation exceeded its configured timeout budget.
    EvaluationTimeout,
    /// The audit chain is broken at the given sequence number.
    TamperedAt(u64),
    /// The pluggable storage backend failed to complete an operation.
    StorageFailure(String),
    /// A `require_approval` decision was not resolved before its timeout.
    ApprovalTimeout,
}

impl fmt::Display for AgentMeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMeshError::InvalidKey => write!(f, "invalid public key"),
            AgentMeshError::UnknownAgent => write!(f, "unknown agent"),
            AgentMeshError::CapabilityEscalation { requested, allowed } => write!(
                f,
                "capability escalation: requested [{requested}] exceeds granted [{allowed}]"
            ),
            AgentMeshError::DepthExceeded { depth, max } => {
                write!(f, "delegation depth {depth} exceeds maximum {max}")
            }
            AgentMeshError::Expired => write!(f, "credential or link has expired"),
            AgentMeshError::Revoked => write!(f, "identity has been revoked"),
            AgentMeshError::BadSignature => write!(f, "signature verification failed"),
            AgentMeshError::BrokenChain => write!(f, "delegation chain hash linkage is broken"),
            AgentMeshError::UnknownSponsor => {
                write!(f, "chain root issuer is not a registered sponsor")
            }
            AgentMeshError::PolicyInvalid(reason) => write!(f, "invalid policy document: {reason}"),
            AgentMeshError::RateLimited => write!(f, "action denied by rate limit"),
            AgentMeshError::EvaluationTimeout => write!(f, "policy evaluation timed out"),
            AgentMeshError::TamperedAt(seq) => write!(f, "audit chain tampered at seq {seq}"),
            AgentMeshError::StorageFailure(reason) => write!(f, "storage failure: {reason}"),
            AgentMeshError::ApprovalTimeout => write!(f, "approval request timed out"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AgentMeshError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, AgentMeshError>;
