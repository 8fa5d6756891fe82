//! Init command - install providers and record them in the inventory

use console::style;
use provctl_kube::{InventoryStore, KubeError, RecordingApplier};
use std::path::Path;

use super::{prepare_installer, write_manifest};
use crate::ProviderArgs;
use crate::context::GlobalArgs;
use crate::display;
use crate::error::Result;

pub async fn run(
    global: &GlobalArgs,
    providers: &ProviderArgs,
    dry_run: bool,
    output: Option<&Path>,
) -> Result<()> {
    let repositories = global.repositories()?;
    let inventory = global.inventory().await?;
    if !dry_run {
        inventory.ensure_schema().await?;
    }

    let applier = RecordingApplier::new();
    let installer = prepare_installer(repositories, inventory, applier.clone(), providers).await?;

    if installer.queue().is_empty() {
        println!("{} Nothing to install", style("⚠").yellow());
        return Ok(());
    }

    if dry_run {
        installer.validate()?;
        println!("\n{} Validation passed, objects that would be applied:", style("✓").green());
        for components in installer.queue() {
            println!("\n  {}", style(components.instance()).cyan().bold());
            for object in components.objects() {
                let kind = object.pointer("/kind").and_then(|v| v.as_str()).unwrap_or("?");
                let name = object.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or("?");
                println!("    {} {}/{}", style("•").dim(), kind, name);
            }
        }
        if let Some(path) = output {
            let count = write_manifest(path, installer.queue().iter().flat_map(|c| c.objects()))?;
            println!("\n{} Wrote {} object(s) to {}", style("✓").green(), count, path.display());
        }
        println!("\n{} Dry run, nothing was installed", style("⚠").yellow());
        return Ok(());
    }

    println!("\n{} Installing {} provider(s)", style("→").blue(), installer.queue().len());

    match installer.install().await {
        Ok(installed) => {
            for components in &installed {
                println!(
                    "{} Installed {}",
                    style("✓").green().bold(),
                    style(components.instance()).cyan()
                );
            }
            write_applied(output, &applier)?;
        }
        Err(KubeError::PartialApply(report)) => {
            display::print_report(&report, "Installed");
            write_applied(output, &applier)?;
            return Err(KubeError::PartialApply(report).into());
        }
        Err(err) => return Err(err.into()),
    }

    println!(
        "\n{} {} object(s) applied, inventory updated",
        style("✓").green().bold(),
        applier.count()
    );
    Ok(())
}

fn write_applied(output: Option<&Path>, applier: &RecordingApplier) -> Result<()> {
    if let Some(path) = output {
        let applied = applier.applied();
        let count = write_manifest(path, applied.iter().map(|a| &a.object))?;
        println!(
            "{} Wrote {} applied object(s) to {}",
            style("✓").green(),
            count,
            path.display()
        );
    }
    Ok(())
}
