// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handler that times observations into a [`Metrics`] store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::HandlerError;
use crate::observation::{Context, Event, ObservationHandler, ObservationId};
use crate::telemetry::metrics::{Metrics, SeriesKey, GLOBAL_METRICS};

/// Feeds a [`Metrics`] store from observations.
///
/// On start the series for the context's current tags gains an active
/// observation. On finish that same series is released and a timer sample is
/// recorded under the final tag set, which may have grown while the work ran.
/// Events become counters.
#[derive(Debug)]
pub struct MetricsHandler {
    metrics: Arc<Metrics>,
    in_flight: Mutex<HashMap<ObservationId, SeriesKey>>,
}

impl MetricsHandler {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn finish(&self, context: &Context, success: bool) {
        let started = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&context.id());
        if let Some(started) = started {
            self.metrics.release_active(&started);
        }

        let key = SeriesKey::new(context.name(), context.low_cardinality_key_values());
        let duration = context.duration().unwrap_or(Duration::ZERO);
        self.metrics.record_timer(&key, duration, success);
    }
}

impl Default for MetricsHandler {
    fn default() -> Self {
        Self::new(Arc::clone(&GLOBAL_METRICS))
    }
}

impl ObservationHandler for MetricsHandler {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_start(&self, context: &Context) -> Result<(), HandlerError> {
        let key = SeriesKey::new(context.name(), context.low_cardinality_key_values());
        self.metrics.record_start(&key);
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(context.id(), key);
        Ok(())
    }

    fn on_stop(&self, context: &Context) -> Result<(), HandlerError> {
        self.finish(context, true);
        Ok(())
    }

    fn on_error(&self, context: &Context) -> Result<(), HandlerError> {
        self.finish(context, false);
        Ok(())
    }

    fn on_event(&self, event: &Event, context: &Context) -> Result<(), HandlerError> {
        self.metrics.record_event(context.name(), &event.name);
        Ok(())
    }
}
