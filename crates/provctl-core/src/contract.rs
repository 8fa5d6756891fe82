//! Contract agreement inside management groups

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use crate::group::ManagementGroup;
use crate::metadata::Metadata;
use crate::provider::ProviderInstance;
use crate::violation::{Violation, Violations};

/// Release metadata indexed by manifest label
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    by_label: HashMap<String, Metadata>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a manifest label, replacing any previous entry
    pub fn insert(&mut self, manifest_label: impl Into<String>, metadata: Metadata) {
        self.by_label.insert(manifest_label.into(), metadata);
    }

    /// Register metadata, keeping existing rows and adding the release
    /// series the current entry does not know about
    pub fn merge(&mut self, manifest_label: impl Into<String>, metadata: Metadata) {
        match self.by_label.entry(manifest_label.into()) {
            Entry::Vacant(slot) => {
                slot.insert(metadata);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                for series in metadata.release_series {
                    if !current
                        .release_series
                        .iter()
                        .any(|s| s.major == series.major && s.minor == series.minor)
                    {
                        current.release_series.push(series);
                    }
                }
            }
        }
    }

    pub fn get(&self, manifest_label: &str) -> Option<&Metadata> {
        self.by_label.get(manifest_label)
    }

    pub fn contains(&self, manifest_label: &str) -> bool {
        self.by_label.contains_key(manifest_label)
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Contracts the instance's installed version belongs to
    pub fn contracts_of(&self, instance: &ProviderInstance) -> Result<BTreeSet<String>, Violation> {
        let metadata = self
            .get(&instance.manifest_label)
            .ok_or_else(|| Violation::MissingMetadata {
                manifest_label: instance.manifest_label.clone(),
            })?;
        let version = instance.semver().map_err(|_| Violation::InvalidVersion {
            provider: instance.to_string(),
            version: instance.version.clone(),
        })?;
        let contracts = metadata.contracts_for(&version);
        if contracts.is_empty() {
            return Err(Violation::UnknownReleaseSeries {
                provider: instance.to_string(),
                version: instance.version.clone(),
            });
        }
        Ok(contracts)
    }

    /// The first contract of the instance's installed version
    pub fn contract_of(&self, instance: &ProviderInstance) -> Result<String, Violation> {
        self.contracts_of(instance).and_then(|c| {
            c.into_iter().next().ok_or_else(|| Violation::UnknownReleaseSeries {
                provider: instance.to_string(),
                version: instance.version.clone(),
            })
        })
    }
}

/// Check that the members share at least one contract.
///
/// Members whose contracts cannot be determined are reported individually
/// and left out of the intersection. Returns the common contracts.
pub fn check_members_contracts(
    core: &ProviderInstance,
    members: &[ProviderInstance],
    index: &MetadataIndex,
    violations: &mut Violations,
) -> BTreeSet<String> {
    let mut resolved: Vec<(&ProviderInstance, BTreeSet<String>)> = Vec::new();
    for member in members {
        match index.contracts_of(member) {
            Ok(contracts) => resolved.push((member, contracts)),
            Err(v) => violations.push(v),
        }
    }

    let mut iter = resolved.iter();
    let Some((_, first)) = iter.next() else {
        return BTreeSet::new();
    };
    let common: BTreeSet<String> = iter.fold(first.clone(), |acc, (_, contracts)| {
        acc.intersection(contracts).cloned().collect()
    });

    if common.is_empty() {
        violations.push(Violation::IncompatibleContract {
            core: core.to_string(),
            members: resolved
                .iter()
                .map(|(m, c)| (m.to_string(), c.iter().cloned().collect()))
                .collect(),
        });
    }
    common
}

/// Check contract agreement for every group
pub fn check_group_contracts(
    groups: &[ManagementGroup],
    index: &MetadataIndex,
    violations: &mut Violations,
) {
    for group in groups {
        check_members_contracts(&group.core_provider, &group.members, index, violations);
    }
}
