//! Provider installer
//!
//! Validates an install queue against one inventory snapshot and applies it:
//!
//! 1. a queued provider may not reuse the manifest label and namespace of
//!    an installed (or another queued) instance
//! 2. providers of the same type may not watch overlapping namespaces
//! 3. the post-install inventory must resolve into management groups
//! 4. every group must share at least one contract
//!
//! Every violation is collected before failing, and nothing is applied
//! unless validation passes.

use futures::future::join_all;
use provctl_core::{
    Metadata, MetadataIndex, ProviderInstance, Violation, Violations, check_group_contracts,
    collect_management_groups, parse_version,
};
use provctl_repo::{Components, RepoError, Repositories};
use std::sync::Arc;

use crate::applier::ObjectApplier;
use crate::error::{KubeError, Result};
use crate::inventory::InventoryStore;
use crate::report::{ApplyReport, ItemRef};

/// Whether shared objects (CRDs, webhooks) of `candidate` should be applied.
///
/// True for the first instance of a manifest label, and for versions strictly
/// newer than every installed instance of that label. Installed versions that
/// do not parse are ignored.
pub fn should_install_shared_components(
    existing: &[ProviderInstance],
    candidate: &ProviderInstance,
) -> bool {
    let installed_max = existing
        .iter()
        .filter(|e| e.manifest_label == candidate.manifest_label)
        .filter_map(|e| e.semver().ok())
        .max();

    match installed_max {
        None => true,
        Some(max) => candidate.semver().map(|v| v > max).unwrap_or(false),
    }
}

/// Installs a queue of provider components
pub struct ProviderInstaller<S: InventoryStore, A: ObjectApplier> {
    repositories: Arc<Repositories>,
    inventory: S,
    applier: A,
    existing: Vec<ProviderInstance>,
    /// Release metadata of installed instances: (label, version, metadata)
    existing_metadata: Vec<(String, String, Metadata)>,
    /// Manifest labels of installed instances missing from the catalog
    uncataloged: Vec<String>,
    queue: Vec<Components>,
}

impl<S: InventoryStore, A: ObjectApplier> ProviderInstaller<S, A> {
    /// Snapshot the inventory and prefetch the metadata of installed providers
    pub async fn load(repositories: Arc<Repositories>, inventory: S, applier: A) -> Result<Self> {
        let existing = inventory.list().await?;

        let mut slots: Vec<(String, String)> = existing
            .iter()
            .map(|i| (i.manifest_label.clone(), i.version.clone()))
            .collect();
        slots.sort();
        slots.dedup();

        let fetches = slots.iter().map(|(label, version)| {
            let repositories = repositories.clone();
            async move { repositories.metadata(label, version).await }
        });
        let results = join_all(fetches).await;

        let mut existing_metadata = Vec::new();
        let mut uncataloged: Vec<String> = Vec::new();
        for ((label, version), result) in slots.into_iter().zip(results) {
            match result {
                Ok(metadata) => existing_metadata.push((label, version, metadata)),
                Err(RepoError::LabelNotFound { .. }) => {
                    tracing::warn!(provider = %label, "installed provider is not in the catalog");
                    if !uncataloged.contains(&label) {
                        uncataloged.push(label);
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        provider = %label,
                        %version,
                        "no release metadata for installed provider"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut installer =
            Self::with_snapshot(repositories, inventory, applier, existing, existing_metadata);
        installer.uncataloged = uncataloged;
        Ok(installer)
    }

    /// Build from an explicit snapshot
    pub fn with_snapshot(
        repositories: Arc<Repositories>,
        inventory: S,
        applier: A,
        existing: Vec<ProviderInstance>,
        existing_metadata: Vec<(String, String, Metadata)>,
    ) -> Self {
        Self {
            repositories,
            inventory,
            applier,
            existing,
            existing_metadata,
            uncataloged: Vec::new(),
            queue: Vec::new(),
        }
    }

    /// Append to the install queue; nothing is checked here
    pub fn add(&mut self, components: Components) {
        self.queue.push(components);
    }

    pub fn queue(&self) -> &[Components] {
        &self.queue
    }

    pub fn existing(&self) -> &[ProviderInstance] {
        &self.existing
    }

    /// Container images of every queued provider, deduplicated in order
    pub fn images(&self) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();
        for image in self.queue.iter().flat_map(Components::images) {
            if !images.contains(&image) {
                images.push(image);
            }
        }
        images
    }

    /// Metadata for validation: queued versions first, installed ones fill gaps
    fn metadata_index(&self) -> MetadataIndex {
        let mut index = MetadataIndex::new();
        let mut queued: Vec<&Components> = self.queue.iter().collect();
        queued.sort_by(|a, b| {
            let va = parse_version(a.version()).ok();
            let vb = parse_version(b.version()).ok();
            vb.cmp(&va)
        });
        for components in queued {
            if let Some(metadata) = components.metadata() {
                index.merge(components.manifest_label(), metadata.clone());
            }
        }
        for (label, _, metadata) in &self.existing_metadata {
            index.merge(label.clone(), metadata.clone());
        }
        index
    }

    /// Installed manifest labels that have no catalog entry
    pub fn uncataloged(&self) -> &[String] {
        &self.uncataloged
    }

    /// Check the queue against the snapshot, reporting every violation.
    ///
    /// An unregistered hook name fails first, as a configuration error.
    /// Pure computation: repeated calls give the same result.
    pub fn validate(&self) -> Result<()> {
        self.check_hooks()?;

        let mut violations = Violations::new();
        for label in &self.uncataloged {
            violations.push(Violation::NotInCatalog {
                manifest_label: label.clone(),
            });
        }

        let queued: Vec<ProviderInstance> = self.queue.iter().map(Components::instance).collect();

        for (idx, candidate) in queued.iter().enumerate() {
            let others = self.existing.iter().chain(queued[..idx].iter());
            for other in others {
                check_pair(candidate, other, &mut violations);
            }
        }

        let mut hypothetical = self.existing.clone();
        hypothetical.extend(queued);
        let groups = collect_management_groups(&hypothetical, &mut violations);

        let mut contract_violations = Violations::new();
        check_group_contracts(&groups, &self.metadata_index(), &mut contract_violations);
        for violation in contract_violations {
            // already reported as NotInCatalog
            if let Violation::MissingMetadata { manifest_label } = &violation
                && self.uncataloged.contains(manifest_label)
            {
                continue;
            }
            violations.push(violation);
        }

        violations.into_result()?;
        Ok(())
    }

    /// Every hook named by a queued provider must be registered
    fn check_hooks(&self) -> Result<()> {
        let hooks = self.repositories.hooks();
        for components in &self.queue {
            hooks.ensure_registered(components.config())?;
        }
        Ok(())
    }

    /// Validate, then apply every queued provider and record it in the inventory.
    ///
    /// Items are attempted independently; failures are reported in a
    /// [`KubeError::PartialApply`] without rolling back applied items.
    pub async fn install(&self) -> Result<Vec<Components>> {
        self.validate()?;

        let mut report = ApplyReport::new();
        let mut installed = self.existing.clone();
        let mut applied = Vec::new();

        for components in &self.queue {
            let item = ItemRef::from(&components.instance());
            let stored = match self.install_one(components, &installed).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(provider = %item, error = %e, "failed to install provider");
                    report.record_failed(item, &e);
                    continue;
                }
            };

            // recorded in the inventory from here on, even if the hook fails
            installed.push(stored.clone());
            let init = self
                .repositories
                .hooks()
                .run_init(components.config().init_hook.as_deref(), &stored)
                .await;
            match init {
                Ok(()) => {
                    tracing::info!(provider = %stored, "installed provider");
                    applied.push(components.clone());
                    report.record_applied(item);
                }
                Err(e) => {
                    tracing::warn!(provider = %stored, error = %e, "init hook failed");
                    report.record_failed(item, &KubeError::from(e));
                }
            }
        }

        report.into_result()?;
        Ok(applied)
    }

    /// Apply the provider's objects and record it in the inventory
    async fn install_one(
        &self,
        components: &Components,
        installed: &[ProviderInstance],
    ) -> Result<ProviderInstance> {
        let candidate = components.instance();
        apply_components(&self.applier, components, installed, &candidate).await?;
        self.inventory.create(&candidate).await
    }
}

/// Same-slot and same-type scope checks between a queued instance and one
/// installed or earlier-queued instance. Core overlap is left to group
/// resolution.
fn check_pair(candidate: &ProviderInstance, other: &ProviderInstance, violations: &mut Violations) {
    if candidate.same_slot(other) {
        violations.push(Violation::DuplicateInstance {
            manifest_label: candidate.manifest_label.clone(),
            namespace: candidate.namespace.clone(),
        });
        return;
    }

    if candidate.provider_type == other.provider_type
        && !candidate.is_core()
        && candidate.scope().overlaps(&other.scope())
    {
        violations.push(Violation::WatchOverlap {
            provider: candidate.to_string(),
            existing: other.to_string(),
            same_kind: candidate.manifest_label == other.manifest_label,
        });
    }
}

/// Apply shared objects when warranted, then instance objects
pub(crate) async fn apply_components<A: ObjectApplier>(
    applier: &A,
    components: &Components,
    installed: &[ProviderInstance],
    candidate: &ProviderInstance,
) -> Result<()> {
    if should_install_shared_components(installed, candidate) {
        for object in components.shared_objects() {
            applier.apply(object).await?;
        }
    } else {
        tracing::debug!(
            provider = %candidate,
            "skipping shared objects, an equal or newer version is installed"
        );
    }

    for object in components.instance_objects() {
        applier.apply(object).await?;
    }
    Ok(())
}
