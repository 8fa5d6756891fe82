//! Inventory command - show installed providers and their management groups

use console::style;
use provctl_core::{Violations, collect_management_groups};
use provctl_kube::InventoryStore;

use crate::context::GlobalArgs;
use crate::display;
use crate::error::{CliError, Result};

pub async fn run(global: &GlobalArgs, json: bool) -> Result<()> {
    let inventory = global.inventory().await?;
    let instances = inventory.list().await?;

    if json {
        let out = serde_json::to_string_pretty(&instances).map_err(|e| CliError::Other {
            message: format!("failed to serialize inventory: {}", e),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if instances.is_empty() {
        println!("No providers installed");
        return Ok(());
    }

    display::print_instances(&instances);

    let mut violations = Violations::new();
    let groups = collect_management_groups(&instances, &mut violations);
    display::print_groups(&groups);

    if !violations.is_empty() {
        println!();
        for violation in violations.iter() {
            println!("{} {}", style("⚠").yellow(), violation);
        }
    }
    Ok(())
}
