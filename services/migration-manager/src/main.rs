// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration Manager Service
//!
//! Copies objects from a source bucket to a target bucket directory by
//! directory. It:
//!
//! - Reads the list of directories to migrate from a PostgreSQL ledger
//! - Copies every object under each directory prefix, streaming, with
//!   bounded concurrency
//! - Records directory completion so a restarted run skips finished work
//! - Exposes start/stop/status endpoints and Prometheus metrics

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dropshot::{ConfigDropshot, ConfigLogging, ConfigLoggingLevel, HttpServerStarter};
use tokio::sync::watch;
use tracing::info;

use migration_manager::config::{DEFAULT_LISTEN_PORT, ManagerConfig};
use migration_manager::context::ApiContext;
use migration_manager::db::Database;
use migration_manager::s3::S3Store;
use migration_manager::store::ObjectStore;
use migration_manager::{MigrationManagerImpl, metrics};

/// Default maximum request body size (bytes).
const DEFAULT_BODY_MAX_BYTES: usize = 1024 * 1024;

fn print_version() {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");
    let buildstamp = option_env!("STAMP").unwrap_or("no-STAMP");
    println!("{} {} ({})", name, version, buildstamp);
}

fn print_help(program: &str) {
    print_version();
    println!("Usage: {} [OPTIONS]", program);
    println!();
    println!("Options:");
    println!("  -h, --help       Display this information");
    println!("  -V, --version    Display the program's version number");
    println!();
    println!("Environment variables:");
    println!(
        "  BIND_ADDRESS               Server bind address (default: 0.0.0.0:{})",
        DEFAULT_LISTEN_PORT
    );
    println!("  APP_LISTEN_PORT            Listen port when BIND_ADDRESS is unset");
    println!("  DATABASE_URL               PostgreSQL connection URL");
    println!("  DB_HOST, DB_PORT, DB_USER, DB_PASS, DB_NAME");
    println!("                             Required when DATABASE_URL is unset");
    println!("  S3_SOURCE_ENDPOINT, S3_SOURCE_BUCKET, S3_SOURCE_ACCESS_KEY,");
    println!("  S3_SOURCE_SECRET_KEY, S3_SOURCE_LOCATION, S3_SOURCE_USE_SSL");
    println!("                             Source bucket (required, USE_SSL defaults to true)");
    println!("  S3_TARGET_*                Target bucket, same variables as the source");
    println!("  MAX_CONCURRENT_TRANSFERS   Concurrent copies per directory (default: 16)");
    println!("  MIGRATION_LOG              Progress log path (default: migration.log)");
    println!("  FAILED_FILES_LOG           Failed file log path (default: failed_files.log)");
    println!("  CONFIG_FILE                JSON config file for SIGUSR1 reloading (optional)");
    println!(
        "  RUST_LOG                   Log filter (default: migration_manager=info,dropshot=info)"
    );
}

/// Refuse to start unless the bucket behind `store` exists.
async fn check_bucket(role: &str, store: &dyn ObjectStore) -> Result<()> {
    let exists = store
        .bucket_exists()
        .await
        .with_context(|| format!("Failed to check {} bucket {}", role, store.bucket()))?;
    if !exists {
        bail!("{} bucket {} does not exist", role, store.bucket());
    }
    info!(bucket = %store.bucket(), "{} bucket found", role);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    #[allow(clippy::never_loop)] // Intentional: early return on first recognized arg
    for arg in &args[1..] {
        match arg.as_str() {
            "-V" | "--version" => {
                print_version();
                return Ok(());
            }
            "-h" | "--help" => {
                print_help(&args[0]);
                return Ok(());
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "migration_manager=info,dropshot=info".to_string()),
        ))
        .init();

    print_version();
    metrics::register_metrics();

    let config = ManagerConfig::from_env().context("Failed to load configuration")?;
    info!("Database URL: {}", config.database_url_display());

    let db = Database::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db.init_schema()
        .await
        .context("Failed to create directory table")?;

    let (Some(source_config), Some(target_config)) = (&config.source, &config.target) else {
        bail!("Source and target stores must be configured");
    };
    let source = Arc::new(S3Store::new(source_config));
    let target = Arc::new(S3Store::new(target_config));
    check_bucket("Source", source.as_ref()).await?;
    check_bucket("Target", target.as_ref()).await?;

    let (config_tx, config_rx) = watch::channel(config.clone());

    #[cfg(unix)]
    if let Some(config_path) = config.config_file.clone() {
        if tokio::fs::try_exists(&config_path).await.unwrap_or(false) {
            tokio::spawn(ManagerConfig::start_config_watcher(
                config_path.clone(),
                config.clone(),
                config_tx,
            ));
            info!(
                config_file = %config_path.display(),
                "Config watcher started - send SIGUSR1 to reload"
            );
        } else {
            tracing::warn!(
                config_file = %config_path.display(),
                "CONFIG_FILE specified but file does not exist, config reloading disabled"
            );
        }
    }

    let api_context = ApiContext::new(Arc::new(db), source, target, config_rx);

    let api = migration_api::migration_manager_api_mod::api_description::<MigrationManagerImpl>()
        .map_err(|e| anyhow::anyhow!("Failed to create API description: {}", e))?;

    let bind_address = config
        .bind_address
        .context("Bind address must be configured")?;

    let config_dropshot = ConfigDropshot {
        bind_address,
        default_request_body_max_bytes: DEFAULT_BODY_MAX_BYTES,
        default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
        ..Default::default()
    };

    let config_logging = ConfigLogging::StderrTerminal {
        level: ConfigLoggingLevel::Info,
    };

    let log = config_logging
        .to_logger("migration-manager")
        .map_err(|error| anyhow::anyhow!("failed to create logger: {}", error))?;

    let server = HttpServerStarter::new(&config_dropshot, api, api_context, &log)
        .map_err(|error| anyhow::anyhow!("failed to create server: {}", error))?
        .start();

    info!("Migration manager running on http://{}", bind_address);

    server
        .await
        .map_err(|error| anyhow::anyhow!("server failed: {}", error))
}
