// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handler that mirrors observations as `tracing` spans.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{info_span, Span};

use crate::error::HandlerError;
use crate::observation::{Context, Event, ObservationHandler, ObservationId};

/// Opens one `tracing` span per observation and closes it on the terminal
/// callback.
///
/// The span is named after the contextual name and nested under the parent
/// observation's span when the parent is still open in this handler.
#[derive(Debug, Default)]
pub struct SpanHandler {
    spans: Mutex<HashMap<ObservationId, Span>>,
}

impl SpanHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spans currently open.
    pub fn open_spans(&self) -> usize {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn close(&self, context: &Context) -> Option<Span> {
        let span = self
            .spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&context.id())?;

        let duration_ms = context
            .duration()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_default();
        span.record("duration_ms", duration_ms);
        span.record("tags", tracing::field::display(context.low_cardinality_key_values()));
        Some(span)
    }
}

impl ObservationHandler for SpanHandler {
    fn name(&self) -> &str {
        "spans"
    }

    fn on_start(&self, context: &Context) -> Result<(), HandlerError> {
        let mut spans = self.spans.lock().unwrap_or_else(PoisonError::into_inner);
        let parent = context
            .parent()
            .and_then(|p| spans.get(&p.id))
            .cloned();

        let span = match parent {
            Some(parent) => info_span!(
                parent: &parent,
                "observation",
                name = %context.name(),
                contextual_name = %context.display_name(),
                id = %context.id().short(),
                tags = tracing::field::Empty,
                duration_ms = tracing::field::Empty,
                error = tracing::field::Empty,
            ),
            None => info_span!(
                "observation",
                name = %context.name(),
                contextual_name = %context.display_name(),
                id = %context.id().short(),
                tags = tracing::field::Empty,
                duration_ms = tracing::field::Empty,
                error = tracing::field::Empty,
            ),
        };
        spans.insert(context.id(), span);
        Ok(())
    }

    fn on_stop(&self, context: &Context) -> Result<(), HandlerError> {
        if let Some(span) = self.close(context) {
            tracing::debug!(parent: &span, "Observation span closed");
        }
        Ok(())
    }

    fn on_error(&self, context: &Context) -> Result<(), HandlerError> {
        if let Some(span) = self.close(context) {
            span.record("error", context.error().unwrap_or_default());
            tracing::debug!(parent: &span, "Observation span closed with error");
        }
        Ok(())
    }

    fn on_event(&self, event: &Event, context: &Context) -> Result<(), HandlerError> {
        let spans = self.spans.lock().unwrap_or_else(PoisonError::into_inner);
        match spans.get(&context.id()) {
            Some(span) => {
                tracing::info!(parent: span, event = %event.contextual_name, "Observation event");
                Ok(())
            }
            None => Err(HandlerError::failed(format!(
                "no open span for observation {}",
                context.id().short()
            ))),
        }
    }
}
