use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DataElement, Operation, ShardAssignment};

/// Immutable snapshot of `{(element, operation, hashRangeStart) -> client config}`.
///
/// Constructed once (by an operator tool or the persister) and never
/// mutated in place; a "refresh" is done by constructing a new set and
/// handing it to [`crate::ShardConfigurationPersister`]/the shard client
/// manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardConfigurationSet {
    assignments: Vec<ShardAssignment>,
}

impl ShardConfigurationSet {
    pub fn new(assignments: Vec<ShardAssignment>) -> Self {
        Self { assignments }
    }

    /// Ensure `(element, operation, hash_range_start)` uniqueness and that
    /// every `(element, operation)` pair present has at least one
    /// assignment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for assignment in &self.assignments {
            let key = assignment.key();
            if !seen.insert(key) {
                let (element, operation, hash_range_start) = key;
                return Err(ConfigError::DuplicateAssignment {
                    element,
                    operation,
                    hash_range_start,
                });
            }
        }

        // The invariant "non-empty per present (element, operation)" holds
        // trivially for any set built purely from its own assignments: a
        // pair is only "present" because some assignment names it. It
        // becomes meaningful once combined with an expected universe of
        // (element, operation) pairs, which callers check via
        // `has_any(element, operation)` instead.
        Ok(())
    }

    /// Construct and validate in one step.
    pub fn new_validated(assignments: Vec<ShardAssignment>) -> Result<Self, ConfigError> {
        let set = Self::new(assignments);
        set.validate()?;
        Ok(set)
    }

    pub fn items(&self) -> impl Iterator<Item = &ShardAssignment> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn has_any(&self, element: DataElement, operation: Operation) -> bool {
        self.assignments
            .iter()
            .any(|a| a.element == element && a.operation == operation)
    }

    pub fn for_element_operation(
        &self,
        element: DataElement,
        operation: Operation,
    ) -> impl Iterator<Item = &ShardAssignment> {
        self.assignments
            .iter()
            .filter(move |a| a.element == element && a.operation == operation)
    }

    /// Structural, order-independent equality.
    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl PartialEq for ShardConfigurationSet {
    fn eq(&self, other: &Self) -> bool {
        let lhs: HashSet<&ShardAssignment> = self.assignments.iter().collect();
        let rhs: HashSet<&ShardAssignment> = other.assignments.iter().collect();
        lhs == rhs
    }
}
impl Eq for ShardConfigurationSet {}

/// Counts, per `ShardClientConfig`, how many assignments in a set reference
/// it — used by the shard client manager to decide which pooled clients to
/// create or close during a refresh.
pub fn ref_counts_by_config(
    set: &ShardConfigurationSet,
) -> HashMap<crate::ShardClientConfig, usize> {
    let mut counts = HashMap::new();
    for assignment in set.items() {
        *counts.entry(assignment.client_config.clone()).or_insert(0) += 1;
    }
    counts
}
