// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration Manager Library
//!
//! Copies every object of a source bucket to a target bucket, one directory
//! (key prefix) at a time, recording per-directory progress in a PostgreSQL
//! ledger so an interrupted migration resumes where it left off.
//!
//! # Modules
//!
//! - [`config`] - Environment and reloadable file configuration
//! - [`context`] - API context for request handlers
//! - [`db`] - PostgreSQL ledger
//! - [`jobs`] - Transfer, directory and run engine
//! - [`ledger`] - Ledger trait and in-memory implementation
//! - [`progress`] - Append-only progress and failure logs
//! - [`run_state`] - Single active run bookkeeping
//! - [`s3`] / [`store`] - Object store trait and S3 implementation

pub mod config;
pub mod context;
pub mod db;
pub mod jobs;
pub mod ledger;
pub mod metrics;
pub mod progress;
pub mod run_state;
pub mod s3;
pub mod store;

use dropshot::{Body, ClientErrorStatusCode, HttpError, HttpResponseOk, RequestContext};
use http::{Response, StatusCode};
use migration_api::{MSG_STARTED, MSG_STOPPING, MigrationManagerApi};
use migration_types::{DirectoryRecord, MigrationStatus};

use crate::context::{ApiContext, StartError};

fn text_response(content_type: &str, body: String) -> Result<Response<Body>, HttpError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(body.into())
        .map_err(|e| HttpError::for_internal_error(format!("Failed to build response: {}", e)))
}

fn conflict(msg: impl ToString) -> HttpError {
    HttpError::for_client_error(None, ClientErrorStatusCode::CONFLICT, msg.to_string())
}

/// Migration Manager API implementation
///
/// All state is stored in the `ApiContext`.
pub enum MigrationManagerImpl {}

impl MigrationManagerApi for MigrationManagerImpl {
    type Context = ApiContext;

    async fn start_migration(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError> {
        let ctx = rqctx.context();

        match ctx.start_migration().await {
            Ok(run) => {
                tracing::info!(run_id = %run.run_id, "Migration started");
                text_response("text/plain", MSG_STARTED.to_string())
            }
            Err(StartError::Conflict(e)) => {
                tracing::warn!("Start requested while a migration is running");
                Err(conflict(e))
            }
            Err(e @ StartError::Log(_)) => {
                tracing::error!(error = %e, "Failed to start migration");
                Err(HttpError::for_internal_error(e.to_string()))
            }
        }
    }

    async fn stop_migration(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError> {
        let ctx = rqctx.context();

        ctx.stop_migration().map_err(conflict)?;
        text_response("text/plain", MSG_STOPPING.to_string())
    }

    async fn get_status(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<MigrationStatus>, HttpError> {
        let ctx = rqctx.context();

        let status = ctx
            .status()
            .await
            .map_err(|e| HttpError::for_internal_error(format!("Failed to get status: {}", e)))?;

        Ok(HttpResponseOk(status))
    }

    async fn list_directories(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<DirectoryRecord>>, HttpError> {
        let ctx = rqctx.context();

        let directories = ctx.list_directories().await.map_err(|e| {
            HttpError::for_internal_error(format!("Failed to list directories: {}", e))
        })?;

        Ok(HttpResponseOk(directories))
    }

    async fn get_metrics(
        _rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError> {
        text_response("text/plain; version=0.0.4", metrics::gather_metrics())
    }
}
