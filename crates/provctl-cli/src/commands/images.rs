//! Images command - list container images of the requested providers

use crate::ProviderArgs;
use crate::context::GlobalArgs;
use crate::error::Result;

pub async fn run(global: &GlobalArgs, providers: &ProviderArgs) -> Result<()> {
    let installer = super::load_installer(global, providers).await?;
    println!();
    for image in installer.images() {
        println!("{}", image);
    }
    Ok(())
}
