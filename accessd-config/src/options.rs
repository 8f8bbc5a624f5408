use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which hash function the manager uses for user/group identifiers (the
/// "pluggable hashCodeGenerator" of spec §6). Concrete hashers live in the
/// `accessd` crate; this is just the selector that travels through config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HasherKind {
    #[default]
    Fnv1a,
}

/// Recognized coordinator options (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorOptions {
    /// Batch size for the splitter's copy loop. Must be >= 1.
    pub event_batch_size: usize,
    /// Drain poll attempts before the splitter gives up. Must be >= 0.
    pub source_writer_ops_complete_check_retry_attempts: u32,
    /// Milliseconds between drain polls. Must be >= 0.
    #[serde(with = "duration_millis")]
    pub source_writer_ops_complete_check_retry_interval: Duration,
    /// Whether Group events are hash-filtered during a split.
    pub filter_group_events_by_hash_range: bool,
    /// Whether to emit metrics from the coordinator/manager/splitter.
    pub metrics_enabled: bool,
    /// Hasher used for the user partitioning dimension.
    pub user_hasher: HasherKind,
    /// Hasher used for the group partitioning dimension.
    pub group_hasher: HasherKind,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            event_batch_size: 500,
            source_writer_ops_complete_check_retry_attempts: 10,
            source_writer_ops_complete_check_retry_interval: Duration::from_millis(1000),
            filter_group_events_by_hash_range: true,
            metrics_enabled: true,
            user_hasher: HasherKind::default(),
            group_hasher: HasherKind::default(),
        }
    }
}

impl CoordinatorOptions {
    /// Precondition checks a split call must perform up front (spec
    /// `SplitPreconditionViolation`: fatal to the call, never raised mid-protocol).
    pub fn validate(&self) -> Result<(), String> {
        if self.event_batch_size < 1 {
            return Err("event_batch_size must be >= 1".into());
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let options = CoordinatorOptions::default();
        let json = serde_json::to_string(&options).unwrap();
        let back: CoordinatorOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, back);
    }

    #[test]
    fn batch_size_zero_is_rejected() {
        let mut options = CoordinatorOptions::default();
        options.event_batch_size = 0;
        assert!(options.validate().is_err());
    }
}
