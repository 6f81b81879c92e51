// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Dropshot API trait for the object migration manager.
//!
//! The migration manager copies objects from a source bucket to a target
//! bucket one directory (key prefix) at a time, recording per-directory
//! progress in a ledger so an interrupted migration can be resumed.
//!
//! ## Endpoints
//!
//! - `POST /start` - Start a migration run
//! - `POST /stop` - Request cancellation of the active run
//! - `GET /status` - Run state and progress counters
//! - `GET /directories` - All ledger rows
//! - `GET /metrics` - Prometheus metrics

use dropshot::{Body, HttpError, HttpResponseOk, RequestContext};
use http::Response;
use migration_types::{DirectoryRecord, MigrationStatus};

/// Plain-text message for a successful start.
pub const MSG_STARTED: &str = "Migration started";
/// Plain-text message for an accepted stop request.
pub const MSG_STOPPING: &str = "Migration stopping...";
/// Conflict message when a run is already active.
pub const MSG_ALREADY_RUNNING: &str = "Migration is already running";
/// Conflict message when no run is active.
pub const MSG_NOT_RUNNING: &str = "Migration is not running";

/// Migration Manager API
#[dropshot::api_description]
pub trait MigrationManagerApi {
    /// Context type for request handlers
    type Context: Send + Sync + 'static;

    /// Start a migration run
    ///
    /// Begins processing every pending directory in the ledger. The run
    /// proceeds in the background; this call returns as soon as it has
    /// been started.
    ///
    /// Returns 409 if a run is already active.
    /// Returns 500 if the progress log cannot be opened.
    #[endpoint {
        method = POST,
        path = "/start",
        tags = ["migration"],
    }]
    async fn start_migration(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError>;

    /// Stop the active migration run
    ///
    /// Signals cancellation and returns immediately. Transfers already in
    /// flight are allowed to finish; directories not yet started stay
    /// pending for a future run.
    ///
    /// Returns 409 if no run is active.
    #[endpoint {
        method = POST,
        path = "/stop",
        tags = ["migration"],
    }]
    async fn stop_migration(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError>;

    /// Get migration status
    #[endpoint {
        method = GET,
        path = "/status",
        tags = ["migration"],
    }]
    async fn get_status(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<MigrationStatus>, HttpError>;

    /// List ledger directories
    ///
    /// Returns every directory row with its status and timestamps.
    #[endpoint {
        method = GET,
        path = "/directories",
        tags = ["migration"],
    }]
    async fn list_directories(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<HttpResponseOk<Vec<DirectoryRecord>>, HttpError>;

    /// Prometheus metrics
    #[endpoint {
        method = GET,
        path = "/metrics",
        tags = ["metrics"],
    }]
    async fn get_metrics(
        rqctx: RequestContext<Self::Context>,
    ) -> Result<Response<Body>, HttpError>;
}
