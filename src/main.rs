//! PestDesk Worker - bulk visit import backend
//!
//! This worker connects to NATS and handles import requests from the frontend.

mod auth;
mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::services::identity::StaticIdentity;
use crate::services::import_history::ImportHistory;
use crate::services::import_processor::{SpreadsheetFile, VisitImporter};
use crate::services::record_store::PgRecordStore;
use crate::types::NotificationLevel;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,pestdesk_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    let cli = Cli::parse();

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => Ok(()),
        Command::Import { file, user } => run_import(pool, &config, file, user).await,
        Command::Serve => serve(pool, &config).await,
    }
}

async fn serve(pool: sqlx::PgPool, config: &config::Config) -> Result<()> {
    info!("Starting PestDesk Worker...");

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, pool, config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Import a local file on behalf of `user` and print the notifications.
async fn run_import(pool: sqlx::PgPool, config: &config::Config, path: std::path::PathBuf, user: Uuid) -> Result<()> {
    let bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let importer = VisitImporter::new(
        Arc::new(PgRecordStore::new(pool)),
        ImportHistory::load(&config.import_history_file),
    )
    .with_max_rows(config.import_max_rows);

    let summary = importer
        .run(Uuid::new_v4(), &SpreadsheetFile { filename, bytes }, &StaticIdentity(Some(user)))
        .await?;

    for notification in summary.notifications() {
        match notification.level {
            NotificationLevel::Success => println!("✓ {}", notification.message),
            NotificationLevel::Error => println!("✗ {}", notification.message),
        }
    }

    Ok(())
}
