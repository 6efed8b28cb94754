pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rentora")]
#[command(about = "Rentora CLI - company provisioning and bookkeeping administration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Company provisioning and lifecycle")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Seed users, chart of accounts, and demo data")]
    Seed {
        #[command(subcommand)]
        cmd: commands::seed::SeedCommands,
    },

    #[command(about = "Re-post missing journal entries for a company database")]
    Reconcile {
        #[arg(help = "Company subdomain; omit for the global default database")]
        subdomain: Option<String>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::config::config().clone();
    let state = crate::state::AppState::initialize(config).await?;

    match cli.command {
        Commands::Tenant { cmd } => commands::tenant::handle(&state, cmd).await,
        Commands::Seed { cmd } => commands::seed::handle(&state, cmd).await,
        Commands::Reconcile { subdomain } => commands::reconcile(&state, subdomain).await,
    }
}
