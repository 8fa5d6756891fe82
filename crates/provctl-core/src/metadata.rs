//! Provider metadata: the release-series table mapping major.minor to a contract
//!
//! ```yaml
//! apiVersion: provctl.io/v1
//! kind: Metadata
//! releaseSeries:
//!   - major: 0
//!     minor: 3
//!     contract: v1alpha3
//! ```

use phf::phf_map;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{CoreError, Result};

/// One row of the release-series table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSeries {
    pub major: u64,
    pub minor: u64,
    /// Opaque compatibility tag, usually an API version
    pub contract: String,
}

impl ReleaseSeries {
    pub fn new(major: u64, minor: u64, contract: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            contract: contract.into(),
        }
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.major == version.major && self.minor == version.minor
    }
}

/// Parsed `metadata.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    /// Newest first by convention; lookups scan the whole list
    #[serde(default)]
    pub release_series: Vec<ReleaseSeries>,
}

fn default_api_version() -> String {
    "provctl.io/v1".to_string()
}

fn default_kind() -> String {
    "Metadata".to_string()
}

impl Metadata {
    pub fn new(release_series: Vec<ReleaseSeries>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            release_series,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let metadata: Metadata = serde_yaml::from_str(yaml)?;
        if metadata.kind != "Metadata" {
            return Err(CoreError::InvalidMetadata {
                message: format!("expected kind Metadata, found {}", metadata.kind),
            });
        }
        Ok(metadata)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| CoreError::InvalidMetadata {
            message: format!("invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// First series entry for the version's major.minor
    pub fn series_for(&self, version: &Version) -> Option<&ReleaseSeries> {
        self.release_series.iter().find(|s| s.matches(version))
    }

    pub fn contract_for(&self, version: &Version) -> Option<&str> {
        self.series_for(version).map(|s| s.contract.as_str())
    }

    /// Every contract declared for the version's major.minor
    pub fn contracts_for(&self, version: &Version) -> BTreeSet<String> {
        self.release_series
            .iter()
            .filter(|s| s.matches(version))
            .map(|s| s.contract.clone())
            .collect()
    }

    /// Series sorted by (major, minor) ascending
    pub fn sorted_series(&self) -> Vec<&ReleaseSeries> {
        let mut series: Vec<&ReleaseSeries> = self.release_series.iter().collect();
        series.sort_by_key(|s| (s.major, s.minor));
        series
    }

    /// The first contract newer than `current` in release order
    pub fn next_contract(&self, current: &str) -> Option<&str> {
        let series = self.sorted_series();
        let last = series.iter().rposition(|s| s.contract == current)?;
        series[last + 1..]
            .iter()
            .find(|s| s.contract != current)
            .map(|s| s.contract.as_str())
    }

    /// Built-in release series for well-known providers, keyed by manifest label
    pub fn embedded(manifest_label: &str) -> Option<Self> {
        EMBEDDED_RELEASE_SERIES.get(manifest_label).map(|rows| {
            Self::new(
                rows.iter()
                    .map(|(major, minor, contract)| ReleaseSeries::new(*major, *minor, *contract))
                    .collect(),
            )
        })
    }
}

type SeriesRows = &'static [(u64, u64, &'static str)];

const CLUSTER_API_SERIES: SeriesRows = &[(0, 4, "v1alpha4"), (0, 3, "v1alpha3")];
const KUBEADM_SERIES: SeriesRows = &[(0, 4, "v1alpha4"), (0, 3, "v1alpha3")];
const DOCKER_SERIES: SeriesRows = &[(0, 4, "v1alpha4"), (0, 3, "v1alpha3")];
const AWS_SERIES: SeriesRows = &[(0, 7, "v1alpha4"), (0, 6, "v1alpha3"), (0, 5, "v1alpha3")];
const UNDISTRO_SERIES: SeriesRows = &[(0, 2, "v1alpha4"), (0, 1, "v1alpha3")];

static EMBEDDED_RELEASE_SERIES: phf::Map<&'static str, SeriesRows> = phf_map! {
    "cluster-api" => CLUSTER_API_SERIES,
    "undistro" => UNDISTRO_SERIES,
    "bootstrap-kubeadm" => KUBEADM_SERIES,
    "control-plane-kubeadm" => KUBEADM_SERIES,
    "infrastructure-docker" => DOCKER_SERIES,
    "infrastructure-aws" => AWS_SERIES,
};
