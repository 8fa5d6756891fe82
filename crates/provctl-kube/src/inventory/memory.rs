//! In-memory inventory for testing
//!
//! Stores instances in a map, useful for unit tests without a Kubernetes
//! cluster. Tokens are a store-wide generation counter.

use async_trait::async_trait;
use provctl_core::{InstanceKey, ProviderInstance};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::InventoryStore;
use crate::error::{KubeError, Result};

/// In-memory inventory
#[derive(Clone, Default)]
pub struct MemoryInventory {
    store: Arc<RwLock<State>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
}

#[derive(Default)]
struct State {
    generation: u64,
    instances: BTreeMap<InstanceKey, ProviderInstance>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub ensure_schema: usize,
    pub lists: usize,
    pub gets: usize,
    pub creates: usize,
    pub updates: usize,
    pub conflicts: usize,
}

impl MemoryInventory {
    /// Create a new empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated instances; each gets a fresh token
    pub fn with_instances(instances: Vec<ProviderInstance>) -> Self {
        let inventory = Self::new();
        {
            let mut state = inventory.store.write().unwrap();
            for mut instance in instances {
                state.generation += 1;
                instance.resource_version = Some(state.generation.to_string());
                state.instances.insert(instance.key(), instance);
            }
        }
        inventory
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        *self.operations.write().unwrap() = OperationCounts::default();
    }

    pub fn instance_count(&self) -> usize {
        self.store.read().unwrap().instances.len()
    }

    /// Replace a record behind the caller's back, bumping its token
    pub fn touch(&self, key: &InstanceKey) {
        let mut state = self.store.write().unwrap();
        state.generation += 1;
        let generation = state.generation.to_string();
        if let Some(instance) = state.instances.get_mut(key) {
            instance.resource_version = Some(generation);
        }
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn ensure_schema(&self) -> Result<()> {
        self.operations.write().unwrap().ensure_schema += 1;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProviderInstance>> {
        self.operations.write().unwrap().lists += 1;
        Ok(self.store.read().unwrap().instances.values().cloned().collect())
    }

    async fn get(&self, key: &InstanceKey) -> Result<Option<ProviderInstance>> {
        self.operations.write().unwrap().gets += 1;
        Ok(self.store.read().unwrap().instances.get(key).cloned())
    }

    async fn create(&self, instance: &ProviderInstance) -> Result<ProviderInstance> {
        let key = instance.key();
        let mut state = self.store.write().unwrap();
        let stored_token = state
            .instances
            .get(&key)
            .and_then(|i| i.resource_version.clone());
        let exists = state.instances.contains_key(&key);

        match (&instance.resource_version, exists) {
            (None, true) => {
                self.operations.write().unwrap().conflicts += 1;
                return Err(KubeError::conflict(
                    &key.manifest_label,
                    &key.namespace,
                    "instance already exists",
                ));
            }
            (Some(expected), _) if stored_token.as_ref() != Some(expected) => {
                self.operations.write().unwrap().conflicts += 1;
                return Err(KubeError::conflict(
                    &key.manifest_label,
                    &key.namespace,
                    format!("expected token {}, found {:?}", expected, stored_token),
                ));
            }
            _ => {}
        }

        {
            let mut ops = self.operations.write().unwrap();
            if exists {
                ops.updates += 1;
            } else {
                ops.creates += 1;
            }
        }

        state.generation += 1;
        let mut stored = instance.clone();
        stored.resource_version = Some(state.generation.to_string());
        state.instances.insert(key, stored.clone());
        Ok(stored)
    }
}
