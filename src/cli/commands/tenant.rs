use clap::Subcommand;
use std::path::PathBuf;

use crate::services::provisioning::{self, CreateCompanyRequest, DatabaseRemoval};
use crate::services::registry::{self, Branding};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all companies")]
    List,

    #[command(about = "Register a company and provision its database")]
    Create {
        #[arg(help = "Company display name")]
        name: String,

        #[arg(help = "Subdomain (bind key and database file name)")]
        subdomain: String,

        #[arg(long, help = "Custom connection string instead of a local SQLite file")]
        db_uri: Option<String>,
    },

    #[command(about = "Snapshot a company database into a backup file")]
    Export {
        #[arg(help = "Company subdomain")]
        subdomain: String,

        #[arg(long, help = "Output path; defaults to the backups directory")]
        out: Option<PathBuf>,
    },

    #[command(about = "Delete a company record and its local database file")]
    Delete {
        #[arg(help = "Company subdomain")]
        subdomain: String,
    },
}

pub async fn handle(state: &AppState, cmd: TenantCommands) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::List => {
            let master = state.db.master_pool().await?;
            let companies = registry::list_all(&master).await?;
            if companies.is_empty() {
                println!("No companies registered");
                return Ok(());
            }
            println!(
                "{:<5} {:<20} {:<15} {:<8} {:<9} {}",
                "ID", "NAME", "SUBDOMAIN", "ACTIVE", "ARCHIVED", "DATABASE"
            );
            println!("{}", "-".repeat(90));
            for c in companies {
                println!(
                    "{:<5} {:<20} {:<15} {:<8} {:<9} {}",
                    c.id, c.name, c.subdomain, c.is_active, c.is_archived, c.db_uri
                );
            }
            Ok(())
        }
        TenantCommands::Create {
            name,
            subdomain,
            db_uri,
        } => {
            let company = provisioning::create_company(
                state,
                CreateCompanyRequest {
                    name,
                    subdomain,
                    db_uri,
                    branding: Branding::default(),
                },
            )
            .await?;
            println!(
                "Company '{}' created (id {}, database {})",
                company.subdomain, company.id, company.db_uri
            );
            Ok(())
        }
        TenantCommands::Export { subdomain, out } => {
            let path = provisioning::export_company(state, &subdomain, out).await?;
            println!("Exported '{}' to {}", subdomain, path.display());
            Ok(())
        }
        TenantCommands::Delete { subdomain } => {
            let report = provisioning::delete_company(state, &subdomain).await?;
            match report.database {
                DatabaseRemoval::Removed => {
                    println!("Company '{}' and its database deleted", report.subdomain)
                }
                DatabaseRemoval::Pending(reason) => println!(
                    "Company '{}' deleted; database removal pending: {}",
                    report.subdomain, reason
                ),
            }
            Ok(())
        }
    }
}
