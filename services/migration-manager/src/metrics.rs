// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Prometheus metrics for the migration manager
//!
//! Exports metrics for monitoring migration runs including:
//! - Objects processed by status (migrated, failed)
//! - Total bytes copied
//! - Directories processed by result
//! - Ledger write failures
//! - Directory migration time

use std::sync::Once;

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, IntGauge, Opts, Registry, TextEncoder};

// Static metric initialization uses expect because these are compile-time
// constant definitions that cannot fail in practice.
//
// This module exists to scope the clippy allow attributes to just the metric definitions.
#[allow(clippy::expect_used)]
mod metrics_impl {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        /// Registry for all manager metrics
        pub static ref REGISTRY: Registry = Registry::new();

        /// Total bytes copied from source to target
        pub static ref BYTES_TOTAL: Counter = Counter::with_opts(
            Opts::new("migration_manager_bytes_total", "Total bytes copied")
        ).expect("valid metric name");

        /// Objects processed by status (migrated, failed)
        pub static ref OBJECTS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("migration_manager_objects_total", "Objects processed by status"),
            &["status"]
        ).expect("valid metric name and labels");

        /// Directories processed by result (completed, failed, cancelled, skipped)
        pub static ref DIRECTORIES_TOTAL: CounterVec = CounterVec::new(
            Opts::new("migration_manager_directories_total", "Directories processed by result"),
            &["result"]
        ).expect("valid metric name and labels");

        /// Ledger updates that failed, by operation
        ///
        /// A failed `mark_completed` means the directory will be copied again
        /// on the next run.
        pub static ref LEDGER_WRITE_FAILURES: CounterVec = CounterVec::new(
            Opts::new(
                "migration_manager_ledger_write_failures_total",
                "Ledger status updates that failed, by operation"
            ),
            &["operation"]
        ).expect("valid metric name and labels");

        /// Directory migration time histogram
        pub static ref DIRECTORY_DURATION: Histogram = Histogram::with_opts(
            HistogramOpts::new(
                "migration_manager_directory_duration_seconds",
                "Directory migration time in seconds"
            )
            .buckets(vec![0.1, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0])
        ).expect("valid histogram opts");

        /// 1 while a run is active
        pub static ref RUN_ACTIVE: IntGauge = IntGauge::with_opts(
            Opts::new("migration_manager_run_active", "Whether a migration run is active")
        ).expect("valid metric name");
    }
}

pub use metrics_impl::{
    BYTES_TOTAL, DIRECTORIES_TOTAL, DIRECTORY_DURATION, LEDGER_WRITE_FAILURES, OBJECTS_TOTAL,
    REGISTRY, RUN_ACTIVE,
};

static REGISTER: Once = Once::new();

/// Register all metrics with the registry
///
/// Safe to call more than once; only the first call registers.
#[allow(clippy::expect_used)]
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(BYTES_TOTAL.clone()))
            .expect("Failed to register BYTES_TOTAL");
        REGISTRY
            .register(Box::new(OBJECTS_TOTAL.clone()))
            .expect("Failed to register OBJECTS_TOTAL");
        REGISTRY
            .register(Box::new(DIRECTORIES_TOTAL.clone()))
            .expect("Failed to register DIRECTORIES_TOTAL");
        REGISTRY
            .register(Box::new(LEDGER_WRITE_FAILURES.clone()))
            .expect("Failed to register LEDGER_WRITE_FAILURES");
        REGISTRY
            .register(Box::new(DIRECTORY_DURATION.clone()))
            .expect("Failed to register DIRECTORY_DURATION");
        REGISTRY
            .register(Box::new(RUN_ACTIVE.clone()))
            .expect("Failed to register RUN_ACTIVE");
    });
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Record a copied object
pub fn record_object_migrated(bytes: u64) {
    BYTES_TOTAL.inc_by(bytes as f64);
    OBJECTS_TOTAL.with_label_values(&["migrated"]).inc();
}

/// Record an object that failed to copy
pub fn record_object_failed() {
    OBJECTS_TOTAL.with_label_values(&["failed"]).inc();
}

/// Record the end of one directory; `result` is completed, failed or skipped
pub fn record_directory(result: &str) {
    DIRECTORIES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_directory_duration(duration_secs: f64) {
    DIRECTORY_DURATION.observe(duration_secs);
}

/// Record a ledger update that failed; `operation` is the ledger method name
pub fn record_ledger_write_failure(operation: &str) {
    LEDGER_WRITE_FAILURES.with_label_values(&[operation]).inc();
}

pub fn set_run_active(active: bool) {
    RUN_ACTIVE.set(i64::from(active));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ledger_write_failure() {
        let counter = LEDGER_WRITE_FAILURES.with_label_values(&["mark_completed"]);
        let before = counter.get();

        record_ledger_write_failure("mark_completed");
        record_ledger_write_failure("mark_completed");

        assert_eq!(counter.get() - before, 2.0);
    }

    #[test]
    fn test_gather_metrics_produces_output() {
        register_metrics();
        register_metrics();

        record_object_migrated(100);

        let output = gather_metrics();
        assert!(output.contains("migration_manager_bytes_total"));
        assert!(output.contains("migration_manager_objects_total"));
    }
}
