//! Upgrade planning per management group and contract
//!
//! For every management group the planner emits one plan for the group's
//! current contract and, when every member has a release for it, one for
//! the next contract of the core provider. Applying a plan upgrades each
//! member in place: same namespace, same watch, version bumped.

use provctl_core::{
    InstanceKey, ManagementGroup, MetadataIndex, ProviderInstance, Violation, Violations,
    check_members_contracts, find_group, is_newer, latest_version, resolve_management_groups,
};
use provctl_repo::{ComponentsOptions, Repositories, RepositoryClient};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::applier::ObjectApplier;
use crate::error::{KubeError, Result};
use crate::installer::apply_components;
use crate::inventory::InventoryStore;
use crate::report::{ApplyReport, ItemRef};

/// One provider of a plan; an empty `next_version` means already current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeItem {
    pub provider: ProviderInstance,
    pub next_version: String,
}

impl UpgradeItem {
    pub fn new(provider: ProviderInstance, next_version: impl Into<String>) -> Self {
        Self {
            provider,
            next_version: next_version.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.next_version.is_empty()
    }
}

/// Upgrade of one management group to the latest releases of one contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub contract: String,
    pub core_provider: ProviderInstance,
    pub providers: Vec<UpgradeItem>,
}

impl UpgradePlan {
    pub fn is_up_to_date(&self) -> bool {
        self.providers.iter().all(|p| !p.is_pending())
    }

    pub fn pending(&self) -> impl Iterator<Item = &UpgradeItem> {
        self.providers.iter().filter(|p| p.is_pending())
    }
}

/// Plans and applies provider upgrades
pub struct UpgradePlanner<S: InventoryStore, A: ObjectApplier> {
    repositories: Arc<Repositories>,
    inventory: S,
    applier: A,
}

/// Latest version per (manifest label, contract) within one planning pass
type ContractCache = HashMap<(String, String), Option<String>>;

impl<S: InventoryStore, A: ObjectApplier> UpgradePlanner<S, A> {
    pub fn new(repositories: Arc<Repositories>, inventory: S, applier: A) -> Self {
        Self {
            repositories,
            inventory,
            applier,
        }
    }

    /// Plans for every management group of the current inventory
    pub async fn plan(&self) -> Result<Vec<UpgradePlan>> {
        let snapshot = self.inventory.list().await?;
        let groups = resolve_management_groups(&snapshot)?;

        let mut cache = ContractCache::new();
        let mut plans = Vec::new();
        for group in &groups {
            plans.extend(self.plan_group(group, &mut cache).await?);
        }
        Ok(plans)
    }

    async fn plan_group(
        &self,
        group: &ManagementGroup,
        cache: &mut ContractCache,
    ) -> Result<Vec<UpgradePlan>> {
        let core = &group.core_provider;
        let core_client = self.repositories.client_for_label(&core.manifest_label)?;

        let mut index = MetadataIndex::new();
        index.insert(
            core.manifest_label.clone(),
            core_client.metadata(&core.version).await?,
        );
        let current = index
            .contract_of(core)
            .map_err(|v| KubeError::from(Violations::from(vec![v])))?;

        let mut plans = Vec::new();
        if let Some(plan) = self.plan_contract(group, &current, false, cache).await? {
            plans.push(plan);
        }

        if let Some(next) = next_contract(&core_client, &current).await? {
            match self.plan_contract(group, &next, true, cache).await? {
                Some(plan) => plans.push(plan),
                None => tracing::debug!(
                    core = %core,
                    contract = %next,
                    "not every provider has a release for the next contract"
                ),
            }
        }
        Ok(plans)
    }

    /// `None` when `require_all` is set and some member has no release
    /// for the contract
    async fn plan_contract(
        &self,
        group: &ManagementGroup,
        contract: &str,
        require_all: bool,
        cache: &mut ContractCache,
    ) -> Result<Option<UpgradePlan>> {
        let mut providers = Vec::with_capacity(group.members.len());
        for member in &group.members {
            let latest = self.latest_for_contract(&member.manifest_label, contract, cache).await?;
            let next_version = match latest {
                Some(version) if is_newer(&version, &member.version) => version,
                Some(_) => String::new(),
                None if require_all => return Ok(None),
                None => String::new(),
            };
            providers.push(UpgradeItem::new(member.clone(), next_version));
        }

        Ok(Some(UpgradePlan {
            contract: contract.to_string(),
            core_provider: group.core_provider.clone(),
            providers,
        }))
    }

    async fn latest_for_contract(
        &self,
        manifest_label: &str,
        contract: &str,
        cache: &mut ContractCache,
    ) -> Result<Option<String>> {
        let key = (manifest_label.to_string(), contract.to_string());
        if let Some(found) = cache.get(&key) {
            return Ok(found.clone());
        }
        let client = self.repositories.client_for_label(manifest_label)?;
        let latest = client.latest_for_contract(contract).await?;
        cache.insert(key, latest.clone());
        Ok(latest)
    }

    /// Recompute the plan of `core` for `contract` and apply its pending items
    pub async fn apply_plan(&self, core: &InstanceKey, contract: &str) -> Result<ApplyReport> {
        let snapshot = self.inventory.list().await?;
        let groups = resolve_management_groups(&snapshot)?;
        let group = core_group(&groups, core)?;

        let mut cache = ContractCache::new();
        let plan = self
            .plan_group(group, &mut cache)
            .await?
            .into_iter()
            .find(|p| p.contract == contract)
            .ok_or_else(|| KubeError::ContractNotFound {
                core: core.to_string(),
                contract: contract.to_string(),
            })?;

        let items: Vec<UpgradeItem> = plan.pending().cloned().collect();
        if items.is_empty() {
            tracing::info!(core = %core, contract, "management group is up to date");
            return Ok(ApplyReport::new());
        }
        self.apply_items(&snapshot, group, &items).await
    }

    /// Upgrade the given members of `core`'s management group.
    ///
    /// Every item is checked before anything is applied: it must belong to
    /// the group, move forward, and leave the group with a common contract.
    pub async fn apply_custom_plan(
        &self,
        core: &InstanceKey,
        items: &[UpgradeItem],
    ) -> Result<ApplyReport> {
        let snapshot = self.inventory.list().await?;
        let groups = resolve_management_groups(&snapshot)?;
        let group = core_group(&groups, core)?;
        self.apply_items(&snapshot, group, items).await
    }

    async fn apply_items(
        &self,
        snapshot: &[ProviderInstance],
        group: &ManagementGroup,
        items: &[UpgradeItem],
    ) -> Result<ApplyReport> {
        let targets = self.validate_items(snapshot, group, items).await?;

        let mut report = ApplyReport::new();
        let mut installed = snapshot.to_vec();

        for (current, version) in targets {
            let item = ItemRef::new(&current.manifest_label, &current.namespace, &version);
            match self.upgrade_one(&current, &version, &installed).await {
                Ok(stored) => {
                    tracing::info!(
                        provider = %stored,
                        from = %current.version,
                        "upgraded provider"
                    );
                    if let Some(slot) = installed.iter_mut().find(|i| i.same_slot(&stored)) {
                        *slot = stored;
                    }
                    report.record_applied(item);
                }
                Err(e) => {
                    tracing::warn!(provider = %item, error = %e, "failed to upgrade provider");
                    report.record_failed(item, &e);
                }
            }
        }

        report.into_result()
    }

    /// Resolve items against the group's members, reporting every problem
    async fn validate_items(
        &self,
        snapshot: &[ProviderInstance],
        group: &ManagementGroup,
        items: &[UpgradeItem],
    ) -> Result<Vec<(ProviderInstance, String)>> {
        let mut violations = Violations::new();
        let mut targets: Vec<(ProviderInstance, String)> = Vec::new();
        let mut seen: HashSet<InstanceKey> = HashSet::new();

        for item in items.iter().filter(|i| i.is_pending()) {
            let key = item.provider.key();
            let Some(current) = group.find(&key) else {
                if snapshot.iter().any(|i| i.key() == key) {
                    violations.push(Violation::NotInGroup {
                        provider: item.provider.to_string(),
                        core: group.core_provider.to_string(),
                    });
                } else {
                    violations.push(Violation::UnknownProvider {
                        provider: item.provider.to_string(),
                    });
                }
                continue;
            };

            if !seen.insert(key) {
                violations.push(Violation::DuplicateUpgrade {
                    provider: current.to_string(),
                });
                continue;
            }

            if !is_newer(&item.next_version, &current.version) {
                violations.push(Violation::NotAnUpgrade {
                    provider: current.to_string(),
                    current: current.version.clone(),
                    target: item.next_version.clone(),
                });
                continue;
            }
            targets.push((current.clone(), item.next_version.clone()));
        }

        // the group as it would look afterwards must still agree on a contract
        if violations.is_empty() && !targets.is_empty() {
            let upgraded: Vec<ProviderInstance> = group
                .members
                .iter()
                .map(|member| {
                    let mut member = member.clone();
                    if let Some((_, version)) = targets.iter().find(|(t, _)| t.same_slot(&member)) {
                        member.version = version.clone();
                    }
                    member
                })
                .collect();

            let index = self.metadata_for(&upgraded).await?;
            check_members_contracts(&upgraded[0], &upgraded, &index, &mut violations);
        }

        violations.into_result()?;
        Ok(targets)
    }

    async fn metadata_for(&self, members: &[ProviderInstance]) -> Result<MetadataIndex> {
        let mut index = MetadataIndex::new();
        for member in members {
            match self.repositories.metadata(&member.manifest_label, &member.version).await {
                Ok(metadata) => index.merge(member.manifest_label.clone(), metadata),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(index)
    }

    async fn upgrade_one(
        &self,
        current: &ProviderInstance,
        version: &str,
        installed: &[ProviderInstance],
    ) -> Result<ProviderInstance> {
        let provider = self.repositories.catalog().get_by_label(&current.manifest_label)?;
        let options = ComponentsOptions::new()
            .version(version)
            .target_namespace(&current.namespace)
            .watching(&current.watched_namespace);
        let components = self.repositories.components_for(provider, &options).await?;

        let mut candidate = current.clone();
        candidate.version = components.version().to_string();
        apply_components(&self.applier, &components, installed, &candidate).await?;

        // keeps the snapshot's token, so a concurrent writer makes this fail
        self.inventory.create(&candidate).await
    }
}

fn core_group<'a>(
    groups: &'a [ManagementGroup],
    core: &InstanceKey,
) -> Result<&'a ManagementGroup> {
    find_group(groups, core).ok_or_else(|| KubeError::CoreProviderNotFound {
        provider: core.to_string(),
    })
}

/// The contract following `current` in the core's latest release
async fn next_contract(client: &RepositoryClient, current: &str) -> Result<Option<String>> {
    let versions = client.versions().await?;
    let Some((latest, _)) = latest_version(versions.iter().map(String::as_str), false) else {
        return Ok(None);
    };
    let metadata = client.metadata(latest).await?;
    Ok(metadata.next_contract(current).map(str::to_string))
}
