//! CLI commands

pub mod images;
pub mod init;
pub mod inventory;
pub mod upgrade;
pub mod validate;

use console::style;
use provctl_core::ProviderType;
use provctl_kube::{ApplyReport, InventoryStore, KubeError, ProviderInstaller, RecordingApplier};
use provctl_repo::{ComponentsOptions, Repositories};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::ProviderArgs;
use crate::context::{GlobalArgs, ProviderSpec};
use crate::display;
use crate::error::{CliError, Result};

/// Core provider added when none is installed or requested
pub const DEFAULT_CORE_PROVIDER: &str = "cluster-api";

pub type Installer = ProviderInstaller<Box<dyn InventoryStore>, RecordingApplier>;

impl ProviderArgs {
    /// Parsed providers in queue order: core first, then the others by type
    fn specs(&self) -> Result<Vec<ProviderSpec>> {
        let mut specs = Vec::new();
        if let Some(core) = &self.core {
            specs.push(ProviderSpec::parse(core, ProviderType::Core)?);
        }
        for (raw, provider_type) in [
            (&self.bootstrap, ProviderType::Bootstrap),
            (&self.control_plane, ProviderType::ControlPlane),
            (&self.infrastructure, ProviderType::Infrastructure),
        ] {
            for entry in raw {
                specs.push(ProviderSpec::parse(entry, provider_type)?);
            }
        }
        Ok(specs)
    }

    fn options(&self, spec: &ProviderSpec) -> ComponentsOptions {
        let mut options = ComponentsOptions::new().watching(self.watching_namespace.as_str());
        if let Some(version) = &spec.version {
            options = options.version(version.as_str());
        }
        if let Some(namespace) = &self.target_namespace {
            options = options.target_namespace(namespace.as_str());
        }
        options
    }
}

/// Load the installer over `inventory` and queue the requested providers.
///
/// The default core provider is queued first when no core provider is
/// installed and none was named.
pub async fn prepare_installer(
    repositories: Arc<Repositories>,
    inventory: Box<dyn InventoryStore>,
    applier: RecordingApplier,
    args: &ProviderArgs,
) -> Result<Installer> {
    let mut specs = args.specs()?;
    let mut installer = ProviderInstaller::load(repositories.clone(), inventory, applier).await?;

    let has_core = installer.existing().iter().any(|i| i.is_core());
    if !has_core && args.core.is_none() {
        tracing::debug!(
            core = DEFAULT_CORE_PROVIDER,
            "no core provider installed, adding the default"
        );
        specs.insert(0, ProviderSpec::parse(DEFAULT_CORE_PROVIDER, ProviderType::Core)?);
    }

    for spec in &specs {
        println!(
            "{} Fetching {} {}",
            style("→").blue(),
            style(spec.manifest_label()).cyan(),
            spec.version.as_deref().unwrap_or("(latest)")
        );
        let components = repositories
            .components(&spec.name, spec.provider_type, &args.options(spec))
            .await?;
        installer.add(components);
    }

    Ok(installer)
}

pub async fn load_installer(global: &GlobalArgs, args: &ProviderArgs) -> Result<Installer> {
    let repositories = global.repositories()?;
    let inventory = global.inventory().await?;
    prepare_installer(repositories, inventory, RecordingApplier::new(), args).await
}

/// Print an apply outcome; a partial failure is printed before it is returned
pub fn finish_report(result: provctl_kube::Result<ApplyReport>, verb: &str) -> Result<ApplyReport> {
    match result {
        Ok(report) => {
            display::print_report(&report, verb);
            Ok(report)
        }
        Err(KubeError::PartialApply(report)) => {
            display::print_report(&report, verb);
            Err(KubeError::PartialApply(report).into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Write objects as a multi-document YAML stream
pub fn write_manifest<'a>(
    path: &Path,
    objects: impl IntoIterator<Item = &'a Value>,
) -> Result<usize> {
    let mut out = String::new();
    let mut count = 0;
    for object in objects {
        let doc = serde_yaml::to_string(object).map_err(|e| CliError::Other {
            message: format!("failed to serialize object: {}", e),
        })?;
        out.push_str("---\n");
        out.push_str(&doc);
        count += 1;
    }
    std::fs::write(path, out)?;
    Ok(count)
}
