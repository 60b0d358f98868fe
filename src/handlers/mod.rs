// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in observation handlers.
//!
//! - [`LoggingHandler`] - before/after log lines keyed by a tag lookup
//! - [`SpanHandler`] - one `tracing` span per observation, nested by parent
//! - [`MetricsHandler`] - timers, active gauges and event counters

mod logging;
mod metrics;
mod span;

pub use logging::{LoggingHandler, DEFAULT_TAG_KEY};
pub use metrics::MetricsHandler;
pub use span::SpanHandler;
