// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! CloudEvents v1.0 export for audit entries.
//!
//! [`events_since`] returns a restartable iterator: callers resume by
//! passing the `seq` one past the last envelope they consumed, rather than
//! this module tracking any cursor itself.

use alloc::format;
use alloc::string::String;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::AuditEntry;
use crate::storage::Storage;

/// A CloudEvents v1.0 envelope wrapping one audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct CloudEvent {
    pub specversion: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub id: String,
    pub time: String,
    pub data: JsonValue,
    pub agentmeshseq: u64,
    pub agentmeshhash: String,
    pub agentmeshprevhash: String,
}

/// Render an ISO-8601 UTC timestamp from Unix epoch milliseconds, without
/// pulling in a full calendar library — precise to the second, which is
/// all CloudEvents display needs here.
fn iso8601_from_epoch_ms(epoch_ms: u64) -> String {
    const SECS_PER_DAY: u64 = 86_400;
    let epoch_secs = epoch_ms / 1_000;
    let ms = epoch_ms % 1_000;
    let days = epoch_secs / SECS_PER_DAY;
    let secs_of_day = epoch_secs % SECS_PER_DAY;
    let (hour, minute, second) = (secs_of_day / 3_600, (secs_of_day / 60) % 60, secs_of_day % 60);

    // Civil-from-days algorithm (Howard Hinnant), proleptic Gregorian.
    let z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{ms:03}Z",
        day = day,
    )
}

impl CloudEvent {
    fn from_entry(entry: &AuditEntry) -> Self {
        Self {
            specversion: "1.0".into(),
            event_type: format!("ai.agentmesh.{}", entry.event_type.as_str()),
            source: entry.actor_did.clone(),
            id: entry.hash.clone(),
            time: iso8601_from_epoch_ms(entry.ts_wall_ms),
            data: entry.payload.clone(),
            agentmeshseq: entry.seq,
            agentmeshhash: entry.hash.clone(),
            agentmeshprevhash: entry.prior_hash.clone(),
        }
    }
}

/// Render every entry from `since` (inclusive) to the current tail as
/// CloudEvents envelopes, ordered by `seq`.
///
/// Returned as a materialized `Vec` rather than a lazy `Iterator` impl: the
/// underlying [`Storage::get_audit`] call is itself synchronous and cheap,
/// and a `Vec` keeps this crate's public surface free of a named iterator
/// type. Callers that want streaming behavior can page by calling this
/// repeatedly with an advancing `since`.
pub fn events_since<S: Storage>(storage: &S, since: u64) -> alloc::vec::Vec<CloudEvent> {
    let mut events = alloc::vec::Vec::new();
    let mut seq = since;
    while let Some(entry) = storage.get_audit(seq) {
        events.push(CloudEvent::from_entry(&entry));
        seq += 1;
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEventType, AuditLogger};
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    #[test]
    fn export_round_trips_hash_and_seq() {
        let mut log = AuditLogger::new(InMemoryStorage::new());
        log.append(AuditEventType::Registration, "did:mesh:a", json!({"k": "v"}), 0, 1_700_000_000_000)
            .unwrap();
        let events = events_since(log.storage(), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].specversion, "1.0");
        assert_eq!(events[0].event_type, "ai.agentmesh.registration");
        assert_eq!(events[0].agentmeshseq, 0);
        assert_eq!(events[0].agentmeshhash, events[0].id);
    }

    #[test]
    fn since_resumes_from_requested_seq() {
        let mut log = AuditLogger::new(InMemoryStorage::new());
        for i in 0..5u64 {
            log.append(AuditEventType::PolicyEvaluation, "did:mesh:a", json!({"i": i}), i, i).unwrap();
        }
        let events = events_since(log.storage(), 3);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].agentmeshseq, 3);
    }
}
