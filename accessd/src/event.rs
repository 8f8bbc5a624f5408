//! The durable, globally-ordered mutation record the Splitter moves between
//! shard groups (spec §3 "Event", §6 "Event reader"/"Idempotent event
//! persister"/"Event deleter").
//!
//! `accessd` does not implement durable event storage — that is an external
//! collaborator (spec §1) — this module only owns the wire shape the
//! Splitter's traits pass around.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use accessd_config::HashRangeStart;

/// Uniquely identifies an event; totally ordered by `OccurredAt` on the
/// shard that produced it, best-effort ordered globally (spec §3).
pub type EventId = Uuid;

/// The mutation kinds listed in spec §3. Each variant carries the minimum
/// payload the Splitter needs to reason about hash-range membership; a real
/// shard's event store carries richer payloads, but the coordination layer
/// only needs `principal_hash` to filter a copy/delete range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    AddUser,
    RemoveUser,
    AddGroup,
    RemoveGroup,
    AddUserToGroupMapping,
    AddGroupToGroupMapping,
    AddUserToApplicationComponentAndAccessLevelMapping,
    AddUserToEntityMapping,
    AddGroupToApplicationComponentAndAccessLevelMapping,
    AddGroupToEntityMapping,
    AddEntityType,
    RemoveEntityType,
    AddEntity,
    RemoveEntity,
}

impl EventKind {
    /// Whether this kind's principal is a group rather than a user —
    /// the Splitter's `filter_group_events_by_hash_range` flag only applies
    /// to these (spec §4.5 step 1).
    pub fn is_group_event(self) -> bool {
        matches!(
            self,
            EventKind::AddGroup
                | EventKind::RemoveGroup
                | EventKind::AddGroupToGroupMapping
                | EventKind::AddGroupToApplicationComponentAndAccessLevelMapping
                | EventKind::AddGroupToEntityMapping
        )
    }
}

/// One durable mutation (spec §3 "Event"). Immutable once created; only the
/// Splitter deletes events, and only during rebalancing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub kind: EventKind,
    /// Opaque, kind-dependent payload (principal name, mapping target,
    /// etc). Carried as a JSON value since its shape is out of this layer's
    /// scope — only `principal_hash` is inspected by the coordination layer.
    pub payload: serde_json::Value,
    /// Hash code of the event's principal (user or group), precomputed by
    /// the shard that produced it so the Splitter can filter by hash range
    /// without decoding `payload` (spec §3 "each event carries a HashCode").
    pub principal_hash: HashRangeStart,
}

impl Event {
    /// Whether this event falls inside `[start, end]` for the purposes of a
    /// split's copy/delete filter. `filter_group_events_by_hash_range`
    /// mirrors `CoordinatorOptions` of the same name: when it is `false`,
    /// every Group event is considered in-range regardless of hash (spec
    /// §4.5 "filterGroupEventsByHashRange: if false, move all Group events
    /// regardless of hash").
    pub fn in_range(
        &self,
        start: HashRangeStart,
        end: HashRangeStart,
        filter_group_events_by_hash_range: bool,
    ) -> bool {
        if self.kind.is_group_event() && !filter_group_events_by_hash_range {
            return true;
        }
        self.principal_hash >= start && self.principal_hash <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, hash: HashRangeStart) -> Event {
        Event {
            event_id: Uuid::nil(),
            occurred_at: chrono::Utc::now(),
            kind,
            payload: serde_json::Value::Null,
            principal_hash: hash,
        }
    }

    #[test]
    fn user_event_outside_range_is_excluded() {
        let e = event(EventKind::AddUser, 100);
        assert!(!e.in_range(0, 50, true));
        assert!(e.in_range(0, 150, true));
    }

    #[test]
    fn group_event_ignores_range_when_filter_disabled() {
        let e = event(EventKind::AddGroup, 9999);
        assert!(e.in_range(0, 50, false));
        assert!(!e.in_range(0, 50, true));
    }

    #[test]
    fn group_event_respects_range_when_filter_enabled() {
        let e = event(EventKind::AddGroup, 25);
        assert!(e.in_range(0, 50, true));
    }
}
