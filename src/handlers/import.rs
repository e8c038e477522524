//! Visit import handlers
//!
//! `pestdesk.import.visit` runs an import and replies with the summary and the
//! notifications to show. Every request is processed on its own task so that
//! imports of different companies do not wait for each other.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use base64::Engine;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::services::identity::JwtIdentity;
use crate::services::import_history::ImportHistoryResponse;
use crate::services::import_processor::{SpreadsheetFile, VisitImporter};
use crate::services::record_store::RecordStore;
use crate::types::{
    ErrorResponse, ImportHistoryRequest, Request, SuccessResponse, VisitImportRequest, VisitImportResponse,
};

/// Upper bound for history page size
const MAX_HISTORY_LIMIT: usize = 100;

/// Shared state of the import handlers
pub struct ImportContext {
    pub importer: VisitImporter,
    pub store: Arc<dyn RecordStore>,
    pub jwt_secret: String,
}

/// Handle pestdesk.import.visit requests
pub async fn handle_visit_import(client: Client, mut subscriber: Subscriber, ctx: Arc<ImportContext>) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let client = client.clone();
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = respond_visit_import(&client, msg, &ctx).await {
                error!("Failed to answer visit import request: {}", e);
            }
        });
    }

    Ok(())
}

async fn respond_visit_import(client: &Client, msg: Message, ctx: &ImportContext) -> Result<()> {
    let reply = match msg.reply {
        Some(ref r) => r.clone(),
        None => {
            warn!("Visit import request without reply subject");
            return Ok(());
        }
    };

    let request: Request<VisitImportRequest> = match serde_json::from_slice(&msg.payload) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse visit import request: {}", e);
            let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
            client.publish(reply, serde_json::to_vec(&error)?.into()).await?;
            return Ok(());
        }
    };

    let body = match run_visit_import(ctx, &request).await {
        Ok(response) => serde_json::to_vec(&SuccessResponse::new(request.id, response))?,
        Err(error) => serde_json::to_vec(&error)?,
    };
    client.publish(reply, body.into()).await?;

    Ok(())
}

/// Decode the uploaded file and run the import for the token's user.
pub async fn run_visit_import(
    ctx: &ImportContext,
    request: &Request<VisitImportRequest>,
) -> Result<VisitImportResponse, ErrorResponse> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(request.payload.content_base64.trim())
        .map_err(|e| {
            warn!("Request {}: file content is not valid base64: {}", request.id, e);
            ErrorResponse::new(request.id, "INVALID_REQUEST", format!("Dosya içeriği çözülemedi: {}", e))
        })?;

    let file = SpreadsheetFile {
        filename: request.payload.filename.clone(),
        bytes,
    };
    let identity = JwtIdentity::from_request(request, &ctx.jwt_secret);
    let run_id = Uuid::new_v4();

    info!("Request {}: import run {} for '{}' ({} bytes)", request.id, run_id, file.filename, file.bytes.len());

    match ctx.importer.run(run_id, &file, &identity).await {
        Ok(summary) => {
            let notifications = summary.notifications();
            Ok(VisitImportResponse { run_id, summary, notifications })
        }
        Err(e) => Err(ErrorResponse::new(request.id, e.code(), e.to_string())),
    }
}

/// Handle pestdesk.import.visit.history requests
pub async fn handle_import_history(client: Client, mut subscriber: Subscriber, ctx: Arc<ImportContext>) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ImportHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import history request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                if let Err(e) = publish(&client, reply, &error).await {
                    warn!("Failed to send import history error reply: {}", e);
                }
                continue;
            }
        };

        match import_history(&ctx, &request).await {
            Ok(history) => publish(&client, reply, &SuccessResponse::new(request.id, history)).await?,
            Err(error) => publish(&client, reply, &error).await?,
        }
    }

    Ok(())
}

/// Recent runs of the caller's company, plus the caller's own runs that failed
/// before the company was known
pub async fn import_history(
    ctx: &ImportContext,
    request: &Request<ImportHistoryRequest>,
) -> Result<ImportHistoryResponse, ErrorResponse> {
    let auth_info = auth::extract_auth(request, &ctx.jwt_secret)
        .map_err(|e| ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string()))?;

    let company_id = match ctx.store.company_for_user(auth_info.user_id).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            return Err(ErrorResponse::new(request.id, "COMPANY_NOT_FOUND", "Kullanıcıya ait şirket bulunamadı"))
        }
        Err(e) => {
            error!("Company lookup for {} failed: {}", auth_info.user_id, e);
            return Err(ErrorResponse::new(request.id, "STORE_ERROR", e.to_string()));
        }
    };

    let limit = request.payload.limit.clamp(1, MAX_HISTORY_LIMIT);
    let runs = ctx.importer.history().recent_for(company_id, auth_info.user_id, limit);
    debug!("Returning {} import runs for company {}", runs.len(), company_id);

    Ok(ImportHistoryResponse {
        total: runs.len(),
        runs,
        in_progress: ctx.importer.locks().is_running(&company_id),
    })
}

async fn publish<T: Serialize>(client: &Client, subject: async_nats::Subject, body: &T) -> Result<()> {
    client.publish(subject, serde_json::to_vec(body)?.into()).await?;
    Ok(())
}
