//! Outcome of applying several providers
//!
//! Install and upgrade attempt every item independently; nothing is rolled
//! back, so the report names exactly which items made it.

use chrono::{DateTime, Utc};
use provctl_core::ProviderInstance;
use std::fmt;

use crate::error::KubeError;

/// Identity of one applied or failed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub manifest_label: String,
    pub namespace: String,
    pub version: String,
}

impl ItemRef {
    pub fn new(
        manifest_label: impl Into<String>,
        namespace: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            manifest_label: manifest_label.into(),
            namespace: namespace.into(),
            version: version.into(),
        }
    }
}

impl From<&ProviderInstance> for ItemRef {
    fn from(instance: &ProviderInstance) -> Self {
        Self::new(&instance.manifest_label, &instance.namespace, &instance.version)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.namespace, self.manifest_label, self.version)
    }
}

/// An item that could not be applied
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub item: ItemRef,
    pub error: String,
    pub retryable: bool,
}

/// Applied and failed items of one install or upgrade call
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub started_at: DateTime<Utc>,
    pub applied: Vec<ItemRef>,
    pub failed: Vec<FailedItem>,
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            applied: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl ApplyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&mut self, item: ItemRef) {
        self.applied.push(item);
    }

    pub fn record_failed(&mut self, item: ItemRef, error: &KubeError) {
        self.failed.push(FailedItem {
            item,
            error: error.to_string(),
            retryable: error.is_retryable(),
        });
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied.len() + self.failed.len()
    }

    /// `Ok` when every item was applied, otherwise [`KubeError::PartialApply`]
    pub fn into_result(self) -> Result<Self, KubeError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(KubeError::PartialApply(self))
        }
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} item(s) failed", self.failed.len(), self.total())?;
        for failed in &self.failed {
            write!(f, "\n  - {}: {}", failed.item, failed.error)?;
        }
        if !self.applied.is_empty() {
            write!(f, "\napplied:")?;
            for applied in &self.applied {
                write!(f, "\n  - {}", applied)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let mut report = ApplyReport::new();
        report.record_applied(ItemRef::new("cluster-api", "capi-system", "v1.0.0"));
        report.record_failed(
            ItemRef::new("infrastructure-aws", "capa-system", "v1.0.0"),
            &KubeError::conflict("infrastructure-aws", "capa-system", "stale token"),
        );

        assert!(!report.is_success());
        assert!(report.failed[0].retryable);
        let text = report.to_string();
        assert!(text.starts_with("1 of 2 item(s) failed"));
        assert!(text.contains("capa-system/infrastructure-aws@v1.0.0"));
        assert!(text.contains("capi-system/cluster-api@v1.0.0"));
        assert!(matches!(report.into_result(), Err(KubeError::PartialApply(_))));
    }
}
