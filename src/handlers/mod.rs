//! NATS message handlers

pub mod import;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::import_history::ImportHistory;
use crate::services::import_processor::VisitImporter;
use crate::services::record_store::{PgRecordStore, RecordStore};

use import::ImportContext;

pub const SUBJECT_VISIT_IMPORT: &str = "pestdesk.import.visit";
pub const SUBJECT_VISIT_IMPORT_HISTORY: &str = "pestdesk.import.visit.history";

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));
    let history = ImportHistory::load(&config.import_history_file);
    let importer = VisitImporter::new(Arc::clone(&store), history).with_max_rows(config.import_max_rows);

    let ctx = Arc::new(ImportContext {
        importer,
        store,
        jwt_secret: config.jwt_secret.clone(),
    });

    let visit_import_sub = client.subscribe(SUBJECT_VISIT_IMPORT).await?;
    let visit_history_sub = client.subscribe(SUBJECT_VISIT_IMPORT_HISTORY).await?;
    info!("Subscribed to {}, {}", SUBJECT_VISIT_IMPORT, SUBJECT_VISIT_IMPORT_HISTORY);

    let client_import = client.clone();
    let ctx_import = Arc::clone(&ctx);
    let visit_import_handle = tokio::spawn(async move {
        import::handle_visit_import(client_import, visit_import_sub, ctx_import).await
    });

    let client_history = client.clone();
    let ctx_history = Arc::clone(&ctx);
    let visit_history_handle = tokio::spawn(async move {
        import::handle_import_history(client_history, visit_history_sub, ctx_history).await
    });

    info!("All handlers started, waiting for messages...");

    select! {
        result = visit_import_handle => {
            error!("Visit import handler finished: {:?}", result);
        }
        result = visit_history_handle => {
            error!("Import history handler finished: {:?}", result);
        }
    }

    Ok(())
}
