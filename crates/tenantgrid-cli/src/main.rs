//! tenantgrid — operator CLI for the tenant-aware routing control plane.
//!
//! ```text
//! tenantgrid provision --tenant-id t-1 --tenant-name acme --tier basic --manifest services.json
//! tenantgrid offboard --tenant-id t-1
//! tenantgrid tenants
//! tenantgrid edge --manifest services.json
//! tenantgrid serve --port 8080 --manifest services.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tenantgrid_core::TenantGridConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tenantgrid",
    about = "TenantGrid — tenant-aware routing and tiered topology",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file. Defaults are used when it does not exist.
    #[arg(long, global = true, default_value = "tenantgrid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a tenant's topology and register its listener rules.
    Provision {
        #[arg(long)]
        tenant_id: String,
        #[arg(long)]
        tenant_name: String,
        /// basic, advanced, premium or platinum. Unknown tiers are pooled.
        #[arg(long, default_value = "basic")]
        tier: String,
        /// Service manifest (JSON).
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        email: Option<String>,
        /// Commit id recorded in the tenant registry.
        #[arg(long, default_value = "local")]
        commit_id: String,
        /// Deployment wave recorded in the tenant registry.
        #[arg(long, default_value = "1")]
        wave: u32,
    },
    /// Remove a tenant's listener rules, topology record and registry entry.
    Offboard {
        #[arg(long)]
        tenant_id: String,
    },
    /// List registered tenants.
    Tenants {
        /// Only tenants in this deployment wave.
        #[arg(long)]
        wave: Option<u32>,
    },
    /// Print the shared edge descriptor for a service manifest.
    Edge {
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Run the edge emulator against the persisted listener rules.
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,
        #[arg(long)]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tenantgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = TenantGridConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Provision {
            tenant_id,
            tenant_name,
            tier,
            manifest,
            email,
            commit_id,
            wave,
        } => {
            let args = commands::provision::ProvisionArgs {
                tenant_id,
                tenant_name,
                tier,
                email: email.unwrap_or_default(),
                manifest,
                commit_id,
                wave,
            };
            let out = commands::provision::run(&config, &args).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Offboard { tenant_id } => {
            let out = commands::offboard::run(&config, &tenant_id).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Tenants { wave } => {
            let records = commands::tenants::run(&config, wave)?;
            if records.is_empty() {
                println!("No tenants registered.");
            }
            for r in records {
                println!(
                    "{:<24} stack={:<32} commit={:<12} wave={}",
                    r.tenant_id, r.stack_name, r.commit_id, r.wave_number
                );
            }
        }
        Commands::Edge { manifest } => {
            let edge = commands::edge::run(&config, &manifest)?;
            println!("{}", serde_json::to_string_pretty(&edge)?);
        }
        Commands::Serve { port, manifest } => {
            commands::serve::run(&config, port, &manifest).await?;
        }
    }

    Ok(())
}
