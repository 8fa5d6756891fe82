//! Validate command - check that adding providers keeps the topology valid

use console::style;

use crate::ProviderArgs;
use crate::context::GlobalArgs;
use crate::error::Result;

pub async fn run(global: &GlobalArgs, providers: &ProviderArgs) -> Result<()> {
    let installer = super::load_installer(global, providers).await?;

    println!(
        "{} Validating {} provider(s) against {} installed",
        style("→").blue(),
        installer.queue().len(),
        installer.existing().len()
    );

    installer.validate()?;

    for components in installer.queue() {
        println!("  {} {}", style("✓").green(), components.instance());
    }
    println!("\n{} Validation passed", style("✓").green().bold());
    Ok(())
}
