//! Object application seam
//!
//! The installer and the upgrade planner hand processed objects to an
//! [`ObjectApplier`]. [`RecordingApplier`] records them instead of talking to
//! a cluster, which is what dry runs and tests use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::error::{KubeError, Result};

/// Applies one Kubernetes object
#[async_trait]
pub trait ObjectApplier: Send + Sync {
    async fn apply(&self, object: &Value) -> Result<()>;
}

/// One recorded object
#[derive(Debug, Clone)]
pub struct AppliedObject {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub object: Value,
}

impl AppliedObject {
    /// `Kind/namespace/name` or `Kind/name`
    pub fn reference(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.kind, ns, self.name),
            None => format!("{}/{}", self.kind, self.name),
        }
    }
}

/// Records applied objects in memory
#[derive(Clone, Default)]
pub struct RecordingApplier {
    applied: Arc<RwLock<Vec<AppliedObject>>>,
    failing_namespaces: Arc<RwLock<BTreeSet<String>>>,
}

impl RecordingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every object placed in `namespace`
    pub fn fail_namespace(self, namespace: impl Into<String>) -> Self {
        self.failing_namespaces.write().unwrap().insert(namespace.into());
        self
    }

    pub fn applied(&self) -> Vec<AppliedObject> {
        self.applied.read().unwrap().clone()
    }

    /// References of objects of `kind`, in application order
    pub fn applied_of_kind(&self, kind: &str) -> Vec<String> {
        self.applied
            .read()
            .unwrap()
            .iter()
            .filter(|o| o.kind == kind)
            .map(AppliedObject::reference)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.applied.read().unwrap().len()
    }
}

#[async_trait]
impl ObjectApplier for RecordingApplier {
    async fn apply(&self, object: &Value) -> Result<()> {
        let text = |pointer: &str| {
            object
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let applied = AppliedObject {
            kind: text("/kind").unwrap_or_default(),
            name: text("/metadata/name").unwrap_or_default(),
            namespace: text("/metadata/namespace"),
            applied_at: Utc::now(),
            object: object.clone(),
        };

        if let Some(ns) = &applied.namespace
            && self.failing_namespaces.read().unwrap().contains(ns)
        {
            return Err(KubeError::ApplyFailed {
                object: applied.reference(),
                message: format!("namespace {} rejects writes", ns),
            });
        }

        tracing::debug!(object = %applied.reference(), "applied object");
        self.applied.write().unwrap().push(applied);
        Ok(())
    }
}
