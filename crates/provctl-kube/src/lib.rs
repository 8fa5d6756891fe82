//! Provctl Kube - cluster side of provctl
//!
//! This crate provides:
//! - **Inventory Stores**: durable record of installed provider instances
//!   (ConfigMaps, local files, or memory) with compare-and-swap writes
//! - **Provider Installer**: validates an install queue against the inventory
//!   and applies it
//! - **Upgrade Planner**: per management group and contract upgrade plans
//! - **Apply Reports**: which items of an install or upgrade made it

pub mod applier;
pub mod error;
pub mod installer;
pub mod inventory;
pub mod report;
pub mod upgrade;

pub use applier::{AppliedObject, ObjectApplier, RecordingApplier};
pub use error::{KubeError, Result};
pub use installer::{ProviderInstaller, should_install_shared_components};
pub use inventory::{
    ConfigMapInventory, DEFAULT_INVENTORY_NAMESPACE, FileInventory, InventoryStore, MemoryInventory,
    OperationCounts,
};
pub use report::{ApplyReport, FailedItem, ItemRef};
pub use upgrade::{UpgradeItem, UpgradePlan, UpgradePlanner};
