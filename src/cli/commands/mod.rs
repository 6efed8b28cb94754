pub mod seed;
pub mod tenant;

use crate::services::{reconcile as reconcile_service, registry};
use crate::state::AppState;

/// Reconcile one company database (or the global default one).
pub async fn reconcile(state: &AppState, subdomain: Option<String>) -> anyhow::Result<()> {
    let pool = match subdomain.as_deref() {
        Some(key) => {
            let master = state.db.master_pool().await?;
            let company = registry::find_by_subdomain(&master, key)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Company '{}' not found", key))?;
            state
                .db
                .get_or_create(&company.subdomain, &company.db_uri)
                .await?
        }
        None => state.db.default_pool().await?,
    };

    let report = reconcile_service::reconcile_books(&pool).await?;
    println!(
        "Reconciled: {} cash receipts, {} reversals, {} invoices, {} expenses",
        report.cash_receipts_posted,
        report.reversals_posted,
        report.invoices_posted,
        report.expenses_posted
    );
    Ok(())
}
