//! Management groups
//!
//! A management group is one core provider plus every non-core provider
//! instance whose watched scope that core owns. Groups are recomputed from
//! an inventory snapshot whenever they are needed and never persisted.
//!
//! Resolution rules:
//! - no two core providers may watch overlapping scopes
//! - each non-core provider must be covered by exactly one core provider
//!   (universal core covers everything, otherwise the core's namespaces
//!   must be a superset of the provider's)
//! - a provider covered by no core is an orphan, unless two or more cores
//!   partially overlap its scope, in which case ownership is ambiguous
//!
//! Every violation in the inventory is collected before failing.

use crate::error::Result;
use crate::provider::{InstanceKey, ProviderInstance};
use crate::violation::{Violation, Violations};

/// A core provider and the instances it manages (core included)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementGroup {
    pub core_provider: ProviderInstance,
    /// Always starts with the core provider
    pub members: Vec<ProviderInstance>,
}

impl ManagementGroup {
    fn new(core_provider: ProviderInstance) -> Self {
        Self {
            members: vec![core_provider.clone()],
            core_provider,
        }
    }

    /// Whether the instance slot (label + namespace) belongs to this group
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.find(key).is_some()
    }

    pub fn find(&self, key: &InstanceKey) -> Option<&ProviderInstance> {
        self.members.iter().find(|m| &m.key() == key)
    }

    /// Members other than the core provider
    pub fn non_core(&self) -> impl Iterator<Item = &ProviderInstance> {
        self.members.iter().skip(1)
    }
}

/// Find the group rooted at the given core provider slot
pub fn find_group<'a>(
    groups: &'a [ManagementGroup],
    core: &InstanceKey,
) -> Option<&'a ManagementGroup> {
    groups.iter().find(|g| &g.core_provider.key() == core)
}

/// Resolve management groups, pushing every violation into `violations`.
///
/// Groups are returned even when violations were found, so callers can
/// keep checking (e.g. contracts) and report everything at once.
pub fn collect_management_groups(
    instances: &[ProviderInstance],
    violations: &mut Violations,
) -> Vec<ManagementGroup> {
    let (cores, others): (Vec<&ProviderInstance>, Vec<&ProviderInstance>) =
        instances.iter().partition(|i| i.is_core());

    for (i, first) in cores.iter().enumerate() {
        for second in &cores[i + 1..] {
            if first.scope().overlaps(&second.scope()) {
                violations.push(Violation::CoreOverlap {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }

    let mut groups: Vec<ManagementGroup> = cores
        .iter()
        .map(|core| ManagementGroup::new((*core).clone()))
        .collect();

    for provider in others {
        let scope = provider.scope();
        let covering: Vec<usize> = cores
            .iter()
            .enumerate()
            .filter(|(_, core)| core.scope().covers(&scope))
            .map(|(idx, _)| idx)
            .collect();

        match covering.as_slice() {
            [owner] => groups[*owner].members.push(provider.clone()),
            [] => {
                let overlapping: Vec<String> = cores
                    .iter()
                    .filter(|core| core.scope().overlaps(&scope))
                    .map(|core| core.to_string())
                    .collect();
                if overlapping.len() > 1 {
                    violations.push(Violation::AmbiguousOwnership {
                        provider: provider.to_string(),
                        cores: overlapping,
                    });
                } else {
                    violations.push(Violation::OrphanProvider {
                        provider: provider.to_string(),
                        scope: scope.to_string(),
                    });
                }
            }
            many => violations.push(Violation::AmbiguousOwnership {
                provider: provider.to_string(),
                cores: many.iter().map(|idx| cores[*idx].to_string()).collect(),
            }),
        }
    }

    groups
}

/// Resolve management groups, failing with every violation found
pub fn resolve_management_groups(instances: &[ProviderInstance]) -> Result<Vec<ManagementGroup>> {
    let mut violations = Violations::new();
    let groups = collect_management_groups(instances, &mut violations);
    violations.into_result()?;
    Ok(groups)
}
