//! Inventory stores: the durable record of installed provider instances
//!
//! provctl supports several backends:
//! - **ConfigMap**: one ConfigMap per instance in an inventory namespace
//! - **File** (CLI default): one JSON document per instance under a directory
//! - **Memory**: in-process map with operation counters (for tests)
//!
//! Every record is keyed by `(manifestLabel, namespace)` and carries an
//! opaque concurrency token in [`ProviderInstance::resource_version`].

mod configmap;
mod file;
mod memory;

pub use configmap::{ConfigMapInventory, DEFAULT_INVENTORY_NAMESPACE};
pub use file::FileInventory;
pub use memory::{MemoryInventory, OperationCounts};

use async_trait::async_trait;
use provctl_core::{InstanceKey, ProviderInstance};

use crate::error::Result;

/// Storage backend for installed provider instances
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Idempotent setup of whatever the store needs
    async fn ensure_schema(&self) -> Result<()>;

    /// Every recorded instance, sorted by key
    async fn list(&self) -> Result<Vec<ProviderInstance>>;

    /// The instance recorded for a key, if any
    async fn get(&self, key: &InstanceKey) -> Result<Option<ProviderInstance>>;

    /// Create or update a record with compare-and-swap.
    ///
    /// A `None` token expects no record; `Some(token)` expects the stored
    /// token to match. A mismatch is [`KubeError::Conflict`](crate::KubeError::Conflict).
    /// Returns the stored instance carrying its new token.
    async fn create(&self, instance: &ProviderInstance) -> Result<ProviderInstance>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Box<T> {
    async fn ensure_schema(&self) -> Result<()> {
        (**self).ensure_schema().await
    }

    async fn list(&self) -> Result<Vec<ProviderInstance>> {
        (**self).list().await
    }

    async fn get(&self, key: &InstanceKey) -> Result<Option<ProviderInstance>> {
        (**self).get(key).await
    }

    async fn create(&self, instance: &ProviderInstance) -> Result<ProviderInstance> {
        (**self).create(instance).await
    }
}
