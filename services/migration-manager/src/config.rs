// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Configuration for the migration manager

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tokio::sync::watch;

/// Default control API port
pub const DEFAULT_LISTEN_PORT: u16 = 9090;

/// Default upper bound on concurrent object copies within a directory
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 16;

/// Connection settings for one S3-compatible bucket
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Region name
    pub location: String,
    /// Host (and optional port) of the service, or a full URL
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"****")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

impl StoreConfig {
    /// Read `<PREFIX>LOCATION`, `<PREFIX>ENDPOINT`, `<PREFIX>BUCKET`,
    /// `<PREFIX>ACCESS_KEY`, `<PREFIX>SECRET_KEY` and `<PREFIX>USE_SSL`.
    fn from_lookup(prefix: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            let var = format!("{}{}", prefix, name);
            lookup(&var)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} environment variable required", var))
        };

        Ok(Self {
            location: lookup(&format!("{}LOCATION", prefix))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: required("ENDPOINT")?,
            bucket: required("BUCKET")?,
            access_key: required("ACCESS_KEY")?,
            secret_key: required("SECRET_KEY")?,
            // Only an explicit "false" turns TLS off
            use_ssl: lookup(&format!("{}USE_SSL", prefix))
                .map(|v| !v.trim().eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        })
    }

    /// Endpoint as a URL, adding the scheme implied by `use_ssl` if missing
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

/// Manager configuration loaded from environment variables or JSON file
///
/// Only `max_concurrent_transfers` may be changed at runtime through the
/// JSON file named by `CONFIG_FILE`; everything else requires a restart.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// PostgreSQL connection URL
    #[serde(skip)]
    pub database_url: String,

    #[serde(skip)]
    pub source: Option<StoreConfig>,

    #[serde(skip)]
    pub target: Option<StoreConfig>,

    /// Control API listen address
    #[serde(skip)]
    pub bind_address: Option<SocketAddr>,

    /// Progress log path
    #[serde(skip)]
    pub migration_log: PathBuf,

    /// Failure log path
    #[serde(skip)]
    pub failed_files_log: PathBuf,

    /// JSON file re-read on SIGUSR1
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Maximum objects copied at once within one directory
    pub max_concurrent_transfers: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            source: None,
            target: None,
            bind_address: None,
            migration_log: PathBuf::from("migration.log"),
            failed_files_log: PathBuf::from("failed_files.log"),
            config_file: None,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let database_url = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url,
            None => database_url_from_parts(&lookup)?,
        };

        let source = StoreConfig::from_lookup("S3_SOURCE_", &lookup)?;
        let target = StoreConfig::from_lookup("S3_TARGET_", &lookup)?;

        let bind_address = match lookup("BIND_ADDRESS") {
            Some(addr) => addr.parse().context("Invalid BIND_ADDRESS")?,
            None => {
                let port: u16 = lookup("APP_LISTEN_PORT")
                    .map(|p| p.parse())
                    .transpose()
                    .context("Invalid APP_LISTEN_PORT")?
                    .unwrap_or(DEFAULT_LISTEN_PORT);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let max_concurrent_transfers = lookup("MAX_CONCURRENT_TRANSFERS")
            .map(|v| v.parse())
            .transpose()
            .context("Invalid MAX_CONCURRENT_TRANSFERS")?
            .unwrap_or(defaults.max_concurrent_transfers);

        let config = Self {
            database_url,
            source: Some(source),
            target: Some(target),
            bind_address: Some(bind_address),
            migration_log: lookup("MIGRATION_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.migration_log),
            failed_files_log: lookup("FAILED_FILES_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.failed_files_log),
            config_file: lookup("CONFIG_FILE").map(PathBuf::from),
            max_concurrent_transfers,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that parsing alone does not enforce
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_transfers == 0 {
            bail!("MAX_CONCURRENT_TRANSFERS must be at least 1");
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    ///
    /// This is used for runtime configuration reloading via SIGUSR1.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge runtime-reloadable fields from another config
    pub fn merge_reloadable(&mut self, other: &ManagerConfig) {
        self.max_concurrent_transfers = other.max_concurrent_transfers;
    }

    /// Start watching for SIGUSR1 to reload config from file
    ///
    /// A reload takes effect for the next run; a run in progress keeps the
    /// limit it started with.
    #[cfg(unix)]
    pub async fn start_config_watcher(
        config_file: PathBuf,
        current_config: Self,
        config_tx: watch::Sender<Self>,
    ) {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigusr1 = match signal(SignalKind::user_defined1()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGUSR1 handler");
                return;
            }
        };

        let mut config = current_config;

        loop {
            sigusr1.recv().await;
            tracing::info!(
                config_file = %config_file.display(),
                "Received SIGUSR1, reloading config"
            );

            match Self::from_file(&config_file).await {
                Ok(new_config) => {
                    config.merge_reloadable(&new_config);

                    if config_tx.send(config.clone()).is_err() {
                        tracing::warn!("No config subscribers, reload had no effect");
                    } else {
                        tracing::info!(
                            max_concurrent_transfers = config.max_concurrent_transfers,
                            "Config reloaded successfully"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        config_file = %config_file.display(),
                        "Failed to reload config"
                    );
                }
            }
        }
    }

    /// Return a display-safe version of the database URL (password masked)
    pub fn database_url_display(&self) -> String {
        // URL format: scheme://[user[:password]@]host[:port]/path
        let authority_start = match self.database_url.find("://") {
            Some(pos) => pos + 3,
            None => return self.database_url.clone(),
        };

        // The last @ ends the userinfo section
        let at_pos = match self.database_url[authority_start..].rfind('@') {
            Some(pos) => authority_start + pos,
            None => return self.database_url.clone(),
        };

        if let Some(relative_colon_pos) = self.database_url[authority_start..at_pos].find(':') {
            let colon_pos = authority_start + relative_colon_pos;
            let prefix = &self.database_url[..colon_pos + 1];
            let suffix = &self.database_url[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }

        self.database_url.clone()
    }
}

/// Assemble a connection URL from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`
/// and `DB_NAME`.
fn database_url_from_parts(lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
    let required = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .with_context(|| format!("DATABASE_URL or {} environment variable required", name))
    };

    let host = required("DB_HOST")?;
    let port: u16 = required("DB_PORT")?
        .parse()
        .context("Invalid DB_PORT")?;
    let user = required("DB_USER")?;
    let pass = required("DB_PASS")?;
    let name = required("DB_NAME")?;

    let userinfo = format!(
        "{}:{}",
        urlencoding::encode(&user),
        urlencoding::encode(&pass)
    );

    Ok(format!(
        "postgres://{}@{}:{}/{}",
        userinfo,
        host,
        port,
        urlencoding::encode(&name)
    ))
}
