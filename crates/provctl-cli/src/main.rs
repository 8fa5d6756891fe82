//! provctl - install, validate and upgrade cluster providers

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod display;
mod error;
mod exit_codes;

use context::GlobalArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "provctl")]
#[command(author = "provctl Contributors")]
#[command(version)]
#[command(about = "Install, validate and upgrade cluster providers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Providers to add, each as `name[:version]`
#[derive(Args, Debug, Default)]
pub struct ProviderArgs {
    /// Core provider (defaults to cluster-api when none is installed)
    #[arg(long)]
    core: Option<String>,

    /// Bootstrap provider(s)
    #[arg(short, long)]
    bootstrap: Vec<String>,

    /// Control plane provider(s)
    #[arg(short, long = "control-plane")]
    control_plane: Vec<String>,

    /// Infrastructure provider(s)
    #[arg(short, long)]
    infrastructure: Vec<String>,

    /// Namespace to install into (defaults to the manifest's Namespace)
    #[arg(short = 'n', long)]
    target_namespace: Option<String>,

    /// Namespace(s) the providers watch, comma separated (default: all)
    #[arg(short, long, default_value = "")]
    watching_namespace: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that adding providers keeps the topology valid
    Validate {
        #[command(flatten)]
        providers: ProviderArgs,
    },

    /// Install providers and record them in the inventory
    Init {
        #[command(flatten)]
        providers: ProviderArgs,

        /// Validate and list objects without installing
        #[arg(long)]
        dry_run: bool,

        /// Write the applied objects as multi-document YAML
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the container images the providers would use
    Images {
        #[command(flatten)]
        providers: ProviderArgs,
    },

    /// Plan and apply provider upgrades
    #[command(subcommand)]
    Upgrade(UpgradeCommands),

    /// Show installed providers and their management groups
    Inventory {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UpgradeCommands {
    /// Show upgrade plans for every management group
    Plan,

    /// Upgrade one management group
    Apply {
        /// Core provider of the group, as `namespace/manifest-label`
        #[arg(long)]
        management_group: String,

        /// Upgrade every provider to the latest release of this contract
        #[arg(long, conflicts_with = "provider", required_unless_present = "provider")]
        contract: Option<String>,

        /// Upgrade selected providers, as `namespace/manifest-label:version`
        #[arg(short, long)]
        provider: Vec<String>,
    },
}

/// Initialize tracing on stderr; `RUST_LOG` wins over the defaults
fn initialize_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;
    match cli.command {
        Commands::Validate { providers } => commands::validate::run(global, &providers).await,

        Commands::Init {
            providers,
            dry_run,
            output,
        } => commands::init::run(global, &providers, dry_run, output.as_deref()).await,

        Commands::Images { providers } => commands::images::run(global, &providers).await,

        Commands::Upgrade(UpgradeCommands::Plan) => commands::upgrade::plan(global).await,

        Commands::Upgrade(UpgradeCommands::Apply {
            management_group,
            contract,
            provider,
        }) => {
            commands::upgrade::apply(global, &management_group, contract.as_deref(), &provider)
                .await
        }

        Commands::Inventory { json } => commands::inventory::run(global, json).await,
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    initialize_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
