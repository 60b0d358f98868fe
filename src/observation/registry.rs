// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Observation registry and dispatch.
//!
//! This module defines:
//! - [`ObservationRegistry`], the ordered set of handlers and filters shared by
//!   every observation
//! - [`ObservationRegistryBuilder`] for assembling a registry at startup
//! - [`ObservationFilter`] for rewriting a context before its terminal callback

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "telemetry")]
use tracing::debug;
use tracing::warn;

use super::context::Context;
use super::handler::{ObservationHandler, Phase};
use super::key_value::{Cardinality, KeyValues};
use crate::error::{HandlerError, ObservationError};

/// Rewrites a context just before its terminal notification.
pub trait ObservationFilter: Send + Sync {
    fn map(&self, context: &mut Context) -> Result<(), ObservationError>;
}

/// Appends a fixed set of low-cardinality tags to every context.
#[derive(Debug, Clone, Default)]
pub struct CommonTagsFilter {
    tags: KeyValues,
}

impl CommonTagsFilter {
    pub fn new(tags: KeyValues) -> Self {
        Self { tags }
    }
}

impl ObservationFilter for CommonTagsFilter {
    fn map(&self, context: &mut Context) -> Result<(), ObservationError> {
        context.add_key_values(Cardinality::Low, &self.tags)
    }
}

/// Ordered collection of handlers and filters.
///
/// Registration order is invocation order. Registration normally completes
/// before the first observation starts, but the lists sit behind a
/// read-write lock so late registration is safe. Dispatch works on a
/// snapshot and never holds the lock while a handler runs.
#[derive(Default)]
pub struct ObservationRegistry {
    handlers: RwLock<Vec<Arc<dyn ObservationHandler>>>,
    filters: RwLock<Vec<Arc<dyn ObservationFilter>>>,
}

impl ObservationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ObservationRegistryBuilder {
        ObservationRegistryBuilder::new()
    }

    /// Append a handler.
    pub fn register<H: ObservationHandler + 'static>(&self, handler: H) {
        self.register_arc(Arc::new(handler));
    }

    pub fn register_arc(&self, handler: Arc<dyn ObservationHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Remove the first handler named `name`. Remaining handlers keep their order.
    pub fn unregister(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.iter().position(|h| h.name() == name) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn add_filter<F: ObservationFilter + 'static>(&self, filter: F) {
        self.filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(filter));
    }

    /// Names of registered handlers, in invocation order.
    pub fn handler_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|h| h.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn ObservationHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handlers that support `context`, in registration order.
    ///
    /// Observations call this once at start and reuse the result for every
    /// later phase.
    pub fn supporting_handlers(&self, context: &Context) -> Vec<Arc<dyn ObservationHandler>> {
        self.snapshot()
            .into_iter()
            .filter(|h| h.supports_context(context))
            .collect()
    }

    /// Notify every supporting handler of `phase`.
    ///
    /// Support is evaluated on each call. Observations use the cached list from
    /// [`supporting_handlers`](Self::supporting_handlers) instead.
    pub fn dispatch(&self, phase: Phase<'_>, context: &Context) {
        notify(&self.supporting_handlers(context), phase, context);
    }

    /// Run every filter over `context`, in registration order.
    pub(crate) fn apply_filters(&self, context: &mut Context) {
        let filters = self
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for filter in filters {
            if let Err(err) = filter.map(context) {
                warn!(observation = %context.name(), error = %err, "Observation filter failed");
            }
        }
    }
}

impl std::fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationRegistry")
            .field("handlers", &self.handler_names())
            .finish_non_exhaustive()
    }
}

/// Invoke `phase` on each handler in order, isolating errors and panics.
pub(crate) fn notify(handlers: &[Arc<dyn ObservationHandler>], phase: Phase<'_>, context: &Context) {
    for handler in handlers {
        #[cfg(feature = "telemetry")]
        debug!(
            handler = %handler.name(),
            phase = %phase,
            observation = %context.name(),
            id = %context.id().short(),
            "Dispatching observation"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| phase.invoke(handler.as_ref(), context)))
            .unwrap_or_else(|payload| Err(panic_to_error(payload.as_ref())));
        if let Err(err) = outcome {
            warn!(
                handler = %handler.name(),
                phase = %phase,
                observation = %context.name(),
                error = %err,
                "Observation handler failed"
            );
        }
    }
}

/// A panicking handler is reported like one that returned an error.
fn panic_to_error(payload: &(dyn Any + Send)) -> HandlerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    HandlerError::failed(format!("panicked: {message}"))
}

/// Builder for constructing an ObservationRegistry.
#[derive(Default)]
pub struct ObservationRegistryBuilder {
    handlers: Vec<Arc<dyn ObservationHandler>>,
    filters: Vec<Arc<dyn ObservationFilter>>,
}

impl ObservationRegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn register<H: ObservationHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Register a shared handler (for handlers the caller also keeps a reference to).
    pub fn register_arc(&mut self, handler: Arc<dyn ObservationHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn filter<F: ObservationFilter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Build the final registry.
    pub fn build(self) -> ObservationRegistry {
        ObservationRegistry {
            handlers: RwLock::new(self.handlers),
            filters: RwLock::new(self.filters),
        }
    }
}
