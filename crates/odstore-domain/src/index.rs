//! Batch-scoped record of entities created or deleted earlier in the batch.
//!
//! The index is owned by one batch coordinator, lives for exactly one
//! `$batch` call and is never persisted. Each key holds a small stack of
//! states so that reverting mutations in reverse order restores whatever
//! the key looked like before them.

use std::collections::HashMap;

use crate::model::{AppliedMutation, OperationFailure};

/// State of an entity as far as the current batch is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Created,
    Deleted,
}

#[derive(Debug, Default)]
pub struct InBatchEntityIndex {
    entries: HashMap<(String, String), Vec<EntityState>>,
}

impl InBatchEntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current in-batch state of `(entity_set, key)`, if this batch touched it.
    pub fn state(&self, entity_set: &str, key: &str) -> Option<EntityState> {
        self.entries
            .get(&(entity_set.to_string(), key.to_string()))
            .and_then(|states| states.last().copied())
    }

    /// Fails with a conflict if the key was created earlier in this batch.
    pub fn check_create(&self, entity_set: &str, key: &str) -> Result<(), OperationFailure> {
        match self.state(entity_set, key) {
            Some(EntityState::Created) => {
                Err(OperationFailure::entity_already_exists(entity_set, key))
            }
            _ => Ok(()),
        }
    }

    /// Applies a successful mutation.
    pub fn record(&mut self, mutation: &AppliedMutation) {
        if let Some((entity_set, key, state)) = Self::affected(mutation) {
            self.entries
                .entry((entity_set.to_string(), key.to_string()))
                .or_default()
                .push(state);
        }
    }

    /// Forgets a mutation that has been compensated.
    pub fn revert(&mut self, mutation: &AppliedMutation) {
        let Some((entity_set, key, state)) = Self::affected(mutation) else {
            return;
        };
        let map_key = (entity_set.to_string(), key.to_string());
        if let Some(states) = self.entries.get_mut(&map_key) {
            if states.last() == Some(&state) {
                states.pop();
            }
            if states.is_empty() {
                self.entries.remove(&map_key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn affected(mutation: &AppliedMutation) -> Option<(&str, &str, EntityState)> {
        match mutation {
            AppliedMutation::Created { entity_set, key }
            | AppliedMutation::CreatedViaNavigation {
                entity_set, key, ..
            } => Some((entity_set.as_str(), key.as_str(), EntityState::Created)),
            AppliedMutation::Deleted { previous } => Some((
                previous.entity_set.as_str(),
                previous.key.as_str(),
                EntityState::Deleted,
            )),
            AppliedMutation::Replaced { .. } | AppliedMutation::Linked { .. } => None,
        }
    }
}
