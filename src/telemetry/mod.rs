// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging setup and the in-process metrics store.
//!
//! - **Subscriber**: [`init_telemetry`] installs a `tracing_subscriber` stack
//!   with an `EnvFilter` (`RUST_LOG` wins) and a `fmt` layer.
//! - **Metrics**: [`Metrics`] collects timers, active gauges and event counters;
//!   the [`MetricsHandler`](crate::handlers::MetricsHandler) feeds it from
//!   observations.
//!
//! # Usage
//!
//! ```rust,ignore
//! use observe::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Histogram, Metrics, MetricsSnapshot, ObservationMetrics, SeriesKey, GLOBAL_METRICS};
