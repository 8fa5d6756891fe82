//! Watched-namespace scopes
//!
//! A provider instance either watches every namespace (empty watch string)
//! or a concrete set of namespaces. Several namespaces may be listed in one
//! watch string, separated by commas.
//!
//! Namespace names are compared exactly. `foo` and `foo-bar` never overlap.

use std::collections::BTreeSet;
use std::fmt;

/// The set of namespaces a provider instance operates over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchScope {
    /// Every namespace in the cluster
    All,
    /// A concrete, non-empty set of namespaces
    Namespaces(BTreeSet<String>),
}

impl WatchScope {
    /// Parse a watched-namespace string; empty means all namespaces
    pub fn parse(watched: &str) -> Self {
        let namespaces: BTreeSet<String> = watched
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();

        if namespaces.is_empty() {
            WatchScope::All
        } else {
            WatchScope::Namespaces(namespaces)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, WatchScope::All)
    }

    /// Two scopes overlap if either is universal or they share a namespace
    pub fn overlaps(&self, other: &WatchScope) -> bool {
        match (self, other) {
            (WatchScope::All, _) | (_, WatchScope::All) => true,
            (WatchScope::Namespaces(a), WatchScope::Namespaces(b)) => !a.is_disjoint(b),
        }
    }

    /// Whether this scope includes every namespace of `other`
    pub fn covers(&self, other: &WatchScope) -> bool {
        match (self, other) {
            (WatchScope::All, _) => true,
            (WatchScope::Namespaces(_), WatchScope::All) => false,
            (WatchScope::Namespaces(a), WatchScope::Namespaces(b)) => a.is_superset(b),
        }
    }
}

impl fmt::Display for WatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchScope::All => write!(f, "all namespaces"),
            WatchScope::Namespaces(ns) => {
                let list: Vec<&str> = ns.iter().map(String::as_str).collect();
                write!(f, "{}", list.join(","))
            }
        }
    }
}
