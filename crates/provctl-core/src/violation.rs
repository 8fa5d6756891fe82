//! Aggregated topology and contract violations
//!
//! Validation never stops at the first problem: every check pushes into a
//! [`Violations`] collection which is turned into an error only at the end.

use std::fmt;

use crate::error::{CoreError, Result};

/// Discriminant of a [`Violation`], used to count violations by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    CoreOverlap,
    OrphanProvider,
    AmbiguousOwnership,
    DuplicateInstance,
    WatchOverlap,
    IncompatibleContract,
    UnknownReleaseSeries,
    MissingMetadata,
    NotInCatalog,
    InvalidVersion,
    UnknownProvider,
    NotInGroup,
    NotAnUpgrade,
    DuplicateUpgrade,
}

/// A single topology, contract or plan problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two core providers watch overlapping namespaces
    CoreOverlap { first: String, second: String },

    /// No core provider watches the provider's scope
    OrphanProvider { provider: String, scope: String },

    /// More than one core provider could own the provider
    AmbiguousOwnership { provider: String, cores: Vec<String> },

    /// An instance of the same provider already lives in the namespace
    DuplicateInstance {
        manifest_label: String,
        namespace: String,
    },

    /// Two providers of the same type watch overlapping namespaces
    WatchOverlap {
        provider: String,
        existing: String,
        same_kind: bool,
    },

    /// The members of a management group share no contract
    IncompatibleContract {
        core: String,
        members: Vec<(String, Vec<String>)>,
    },

    /// The provider's version is not listed in its release series
    UnknownReleaseSeries { provider: String, version: String },

    MissingMetadata { manifest_label: String },

    /// An installed provider's manifest label has no catalog entry
    NotInCatalog { manifest_label: String },

    InvalidVersion { provider: String, version: String },

    /// A plan item names a provider that is not installed
    UnknownProvider { provider: String },

    /// A plan item names a provider outside the core's management group
    NotInGroup { provider: String, core: String },

    /// A plan item does not move the provider forward
    NotAnUpgrade {
        provider: String,
        current: String,
        target: String,
    },

    /// More than one plan item targets the same installed instance
    DuplicateUpgrade { provider: String },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::CoreOverlap { .. } => ViolationKind::CoreOverlap,
            Violation::OrphanProvider { .. } => ViolationKind::OrphanProvider,
            Violation::AmbiguousOwnership { .. } => ViolationKind::AmbiguousOwnership,
            Violation::DuplicateInstance { .. } => ViolationKind::DuplicateInstance,
            Violation::WatchOverlap { .. } => ViolationKind::WatchOverlap,
            Violation::IncompatibleContract { .. } => ViolationKind::IncompatibleContract,
            Violation::UnknownReleaseSeries { .. } => ViolationKind::UnknownReleaseSeries,
            Violation::MissingMetadata { .. } => ViolationKind::MissingMetadata,
            Violation::NotInCatalog { .. } => ViolationKind::NotInCatalog,
            Violation::InvalidVersion { .. } => ViolationKind::InvalidVersion,
            Violation::UnknownProvider { .. } => ViolationKind::UnknownProvider,
            Violation::NotInGroup { .. } => ViolationKind::NotInGroup,
            Violation::NotAnUpgrade { .. } => ViolationKind::NotAnUpgrade,
            Violation::DuplicateUpgrade { .. } => ViolationKind::DuplicateUpgrade,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::CoreOverlap { first, second } => write!(
                f,
                "core providers {} and {} watch overlapping namespaces; two core providers cannot manage the same scope",
                first, second
            ),
            Violation::OrphanProvider { provider, scope } => write!(
                f,
                "orphan provider {}: no core provider watches {}",
                provider, scope
            ),
            Violation::AmbiguousOwnership { provider, cores } => write!(
                f,
                "ambiguous ownership for provider {}: claimed by core providers {}",
                provider,
                cores.join(", ")
            ),
            Violation::DuplicateInstance {
                manifest_label,
                namespace,
            } => write!(
                f,
                "there is already an instance of {} in namespace {}; use upgrade instead",
                manifest_label, namespace
            ),
            Violation::WatchOverlap {
                provider,
                existing,
                same_kind,
            } => {
                if *same_kind {
                    write!(
                        f,
                        "provider {} would watch namespaces already watched by another instance of the same provider ({})",
                        provider, existing
                    )
                } else {
                    write!(
                        f,
                        "provider {} would watch namespaces already watched by {}, a provider of the same type",
                        provider, existing
                    )
                }
            }
            Violation::IncompatibleContract { core, members } => {
                let detail: Vec<String> = members
                    .iter()
                    .map(|(member, contracts)| format!("{} [{}]", member, contracts.join(",")))
                    .collect();
                write!(
                    f,
                    "incompatible API contract in the management group of {}: {}",
                    core,
                    detail.join(", ")
                )
            }
            Violation::UnknownReleaseSeries { provider, version } => write!(
                f,
                "version {} of provider {} is not part of any release series",
                version, provider
            ),
            Violation::MissingMetadata { manifest_label } => {
                write!(f, "no release metadata available for {}", manifest_label)
            }
            Violation::NotInCatalog { manifest_label } => write!(
                f,
                "installed provider {} has no entry in the provider catalog",
                manifest_label
            ),
            Violation::InvalidVersion { provider, version } => {
                write!(f, "provider {} has an invalid version '{}'", provider, version)
            }
            Violation::UnknownProvider { provider } => {
                write!(f, "provider {} is not installed", provider)
            }
            Violation::NotInGroup { provider, core } => write!(
                f,
                "provider {} is not part of the management group of {}",
                provider, core
            ),
            Violation::NotAnUpgrade {
                provider,
                current,
                target,
            } => write!(
                f,
                "cannot move provider {} from {} to {}: target is not newer",
                provider, current, target
            ),
            Violation::DuplicateUpgrade { provider } => write!(
                f,
                "provider {} appears more than once in the upgrade plan",
                provider
            ),
        }
    }
}

/// Ordered collection of violations found in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn extend(&mut self, other: Violations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Number of violations of the given kind
    pub fn count_of(&self, kind: ViolationKind) -> usize {
        self.0.iter().filter(|v| v.kind() == kind).count()
    }

    pub fn contains_kind(&self, kind: ViolationKind) -> bool {
        self.count_of(kind) > 0
    }

    /// `Ok(())` when empty, otherwise a topology error carrying every violation
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Topology(self))
        }
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(v: Vec<Violation>) -> Self {
        Self(v)
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "found {} violation(s):", self.0.len())?;
        for v in &self.0 {
            write!(f, "\n  - {}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        assert!(Violations::new().into_result().is_ok());
    }

    #[test]
    fn test_counts_and_display() {
        let mut violations = Violations::new();
        violations.push(Violation::OrphanProvider {
            provider: "ns1/infrastructure-aws@v1.0.0".to_string(),
            scope: "ns1".to_string(),
        });
        violations.push(Violation::DuplicateInstance {
            manifest_label: "infrastructure-aws".to_string(),
            namespace: "ns1".to_string(),
        });
        violations.push(Violation::OrphanProvider {
            provider: "ns2/bootstrap-kubeadm@v1.0.0".to_string(),
            scope: "ns2".to_string(),
        });

        assert_eq!(violations.len(), 3);
        assert_eq!(violations.count_of(ViolationKind::OrphanProvider), 2);
        assert!(!violations.contains_kind(ViolationKind::CoreOverlap));

        let err = violations.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("found 3 violation(s):"));
        assert_eq!(message.lines().count(), 4);
        assert_eq!(err.violations().unwrap().len(), 3);
    }
}
