// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Capability tokens and the wildcard subset rule.
//!
//! A capability is a string token naming a permitted verb/object pair (e.g.
//! `"read:data"`), with `"*"` as a universal wildcard and `"verb:*"` as a
//! per-verb wildcard. [`is_subset`] is the single recursive check every
//! delegation and credential operation routes through.

use alloc::collections::BTreeSet;
use alloc::string::String;

/// Does `token` match `granted`, under the wildcard rules?
///
/// * `granted == "*"` matches anything.
/// * `granted == "verb:*"` matches `token == "verb:object"` for any object,
///   and matches `token == "verb:*"` itself.
/// * Otherwise `token == granted` exactly.
fn token_matches(token: &str, granted: &str) -> bool {
    if granted == "*" {
        return true;
    }
    if token == granted {
        return true;
    }
    if let Some(prefix) = granted.strip_suffix(":*") {
        if let Some(token_prefix) = token.split(':').next() {
            return token_prefix == prefix;
        }
    }
    false
}

/// Is `child` a subset of `parent` under the capability wildcard rules?
///
/// An empty `child` set is a subset of anything. Otherwise
/// every token in `child` must be matched by at least one token in
/// `parent`.
pub fn is_subset(child: &BTreeSet<String>, parent: &BTreeSet<String>) -> bool {
    if child.is_empty() {
        return true;
    }
    child
        .iter()
        .all(|token| parent.iter().any(|granted| token_matches(token, granted)))
}

/// Intersect two capability sets under the wildcard rules, producing the
/// most specific representative of each overlapping token.
///
/// Used to compute a delegation chain's effective capability set as the
/// running intersection of every link's declared set. Because each link is
/// already required to narrow
/// relative to its issuer, the intersection degenerates to "the last
/// link's set" for a valid chain — this function is what *detects* an
/// invalid (widening) link in the first place.
pub fn intersect(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
    a.iter()
        .filter(|token| b.iter().any(|other| token_matches(token, other)) || b.contains(*token))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn wildcard_matches_anything() {
        assert!(is_subset(&set(&["read:data", "write:logs"]), &set(&["*"])));
    }

    #[test]
    fn verb_wildcard_matches_any_object() {
        assert!(is_subset(&set(&["read:data"]), &set(&["read:*"])));
        assert!(!is_subset(&set(&["write:data"]), &set(&["read:*"])));
    }

    #[test]
    fn empty_child_is_always_a_subset() {
        assert!(is_subset(&BTreeSet::new(), &set(&["read:data"])));
        assert!(is_subset(&BTreeSet::new(), &BTreeSet::new()));
    }

    #[test]
    fn exact_elementwise_containment() {
        assert!(is_subset(&set(&["read:data"]), &set(&["read:data", "write:data"])));
        assert!(!is_subset(&set(&["read:data", "delete:data"]), &set(&["read:data"])));
    }

    #[test]
    fn not_subset_when_widening() {
        assert!(!is_subset(&set(&["read:*"]), &set(&["read:data"])));
    }
}
