//! Upgrade commands - plan and apply provider upgrades per management group

use console::style;
use provctl_kube::{InventoryStore, RecordingApplier, UpgradeItem, UpgradePlanner};

use super::finish_report;
use crate::context::{GlobalArgs, parse_instance_key};
use crate::display;
use crate::error::{CliError, Result};

pub async fn plan(global: &GlobalArgs) -> Result<()> {
    let planner = UpgradePlanner::new(
        global.repositories()?,
        global.inventory().await?,
        RecordingApplier::new(),
    );

    println!("{} Checking for new releases", style("→").blue());
    let plans = planner.plan().await?;

    if plans.is_empty() {
        println!("{} No management groups found", style("⚠").yellow());
        return Ok(());
    }

    for plan in &plans {
        display::print_plan(plan);
    }

    if let Some(plan) = plans.iter().find(|p| !p.is_up_to_date()) {
        println!(
            "\nTo upgrade, run:\n  {} --management-group {} --contract {}",
            style("provctl upgrade apply").cyan(),
            plan.core_provider.key(),
            plan.contract
        );
    }
    Ok(())
}

pub async fn apply(
    global: &GlobalArgs,
    management_group: &str,
    contract: Option<&str>,
    providers: &[String],
) -> Result<()> {
    let core = parse_instance_key(management_group)?;
    let repositories = global.repositories()?;
    let inventory = global.inventory().await?;

    let result = match contract {
        Some(contract) => {
            println!(
                "{} Upgrading management group {} to the latest {} releases",
                style("→").blue(),
                style(&core).cyan(),
                style(contract).yellow()
            );
            let planner = UpgradePlanner::new(repositories, inventory, RecordingApplier::new());
            planner.apply_plan(&core, contract).await
        }
        None => {
            let items = custom_items(inventory.as_ref(), providers).await?;
            println!(
                "{} Upgrading {} provider(s) in management group {}",
                style("→").blue(),
                items.len(),
                style(&core).cyan()
            );
            let planner = UpgradePlanner::new(repositories, inventory, RecordingApplier::new());
            planner.apply_custom_plan(&core, &items).await
        }
    };

    let report = finish_report(result, "Upgraded")?;
    if report.total() == 0 {
        println!("{} Nothing to upgrade", style("✓").green());
    } else {
        println!("\n{} Upgrade complete", style("✓").green().bold());
    }
    Ok(())
}

/// Resolve `namespace/manifest-label:version` entries against the inventory
async fn custom_items(
    inventory: &dyn InventoryStore,
    providers: &[String],
) -> Result<Vec<UpgradeItem>> {
    let mut items = Vec::with_capacity(providers.len());
    for raw in providers {
        let (key, version) = match raw.rsplit_once(':') {
            Some((key, version)) if !version.is_empty() => (parse_instance_key(key)?, version),
            _ => {
                return Err(CliError::usage(format!(
                    "invalid provider '{}', expected namespace/manifest-label:version",
                    raw
                )));
            }
        };
        let instance = inventory
            .get(&key)
            .await?
            .ok_or_else(|| CliError::usage(format!("provider {} is not installed", key)))?;
        items.push(UpgradeItem::new(instance, version));
    }
    Ok(items)
}
