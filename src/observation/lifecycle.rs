// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The observation state machine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::context::{Context, Event, ParentRef};
use super::handler::{ObservationHandler, Phase};
use super::key_value::Cardinality;
use super::registry::{notify, ObservationRegistry};
use crate::error::ObservationError;

/// Cause recorded when a started observation is dropped without a terminal call.
pub const ABANDONED_CAUSE: &str = "observation dropped before stop";

/// Lifecycle state of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationState {
    Created,
    Started,
    Stopped,
    Errored,
}

impl ObservationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

impl fmt::Display for ObservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "CREATED",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Errored => "ERRORED",
        };
        f.write_str(label)
    }
}

/// A named, tagged, timed unit of work broadcast to registered handlers.
///
/// The observation owns its [`Context`] and shares the registry. Handlers
/// see `on_start` exactly once and exactly one terminal callback. An
/// observation dropped while started takes the error path with
/// [`ABANDONED_CAUSE`], so panics and cancelled futures still close out.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use observe::observation::{Observation, ObservationRegistry};
///
/// let registry = Arc::new(ObservationRegistry::new());
/// let mut observation = Observation::create("user.name", "getting-user-name", &registry);
/// observation.low_cardinality_key_value("userType", "userType2")?;
///
/// let name = observation.observe(|_ctx| "foo")?;
/// ```
pub struct Observation {
    context: Context,
    registry: Arc<ObservationRegistry>,
    state: ObservationState,
    handlers: Vec<Arc<dyn ObservationHandler>>,
}

impl Observation {
    /// Create an observation in the CREATED state.
    pub fn create(
        name: impl Into<String>,
        contextual_name: impl Into<String>,
        registry: &Arc<ObservationRegistry>,
    ) -> Self {
        Self::from_context(Context::new(name, contextual_name), registry)
    }

    /// Create an observation around a pre-populated context.
    pub fn from_context(context: Context, registry: &Arc<ObservationRegistry>) -> Self {
        Self {
            context,
            registry: Arc::clone(registry),
            state: ObservationState::Created,
            handlers: Vec::new(),
        }
    }

    /// Link this observation to the one that caused it.
    pub fn parent(self, parent: &Context) -> Self {
        self.parent_ref(parent.as_parent())
    }

    pub fn parent_ref(mut self, parent: ParentRef) -> Self {
        self.context.set_parent(parent);
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable context access. Mutations still fail once the observation is terminal.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn state(&self) -> ObservationState {
        self.state
    }

    pub fn key_value(
        &mut self,
        cardinality: Cardinality,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.context.add_key_value(cardinality, key, value)
    }

    pub fn low_cardinality_key_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.key_value(Cardinality::Low, key, value)
    }

    pub fn high_cardinality_key_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.key_value(Cardinality::High, key, value)
    }

    /// CREATED -> STARTED, notifying `on_start`.
    pub fn start(&mut self) -> Result<(), ObservationError> {
        self.expect_state(ObservationState::Created, "start")?;

        self.handlers = self.registry.supporting_handlers(&self.context);
        self.context.mark_started();
        debug!(
            observation = %self.context.name(),
            id = %self.context.id().short(),
            handlers = self.handlers.len(),
            "Observation started"
        );
        self.state = ObservationState::Started;
        notify(&self.handlers, Phase::Start, &self.context);
        Ok(())
    }

    /// STARTED -> STOPPED, notifying `on_stop`.
    pub fn stop(&mut self) -> Result<(), ObservationError> {
        self.expect_state(ObservationState::Started, "stop")?;
        self.finish(None);
        Ok(())
    }

    /// STARTED -> ERRORED, notifying `on_error`.
    ///
    /// Only the notification happens here; the caller keeps ownership of
    /// `cause` and is expected to propagate it.
    pub fn error<E: fmt::Display + ?Sized>(&mut self, cause: &E) -> Result<(), ObservationError> {
        self.expect_state(ObservationState::Started, "error")?;
        self.finish(Some(cause.to_string()));
        Ok(())
    }

    /// Broadcast an event to the handlers of a started observation.
    pub fn event(&mut self, event: Event) -> Result<(), ObservationError> {
        self.expect_state(ObservationState::Started, "record event on")?;
        notify(&self.handlers, Phase::Event(&event), &self.context);
        Ok(())
    }

    /// Start, run `work`, then stop on `Ok` or take the error path on `Err`.
    ///
    /// The work's error is returned unchanged after `on_error` fired.
    pub fn scoped<T, E, F>(mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context) -> Result<T, E>,
        E: From<ObservationError> + fmt::Display,
    {
        self.start()?;
        let outcome = work(&mut self.context);
        self.complete(outcome)
    }

    /// [`scoped`](Self::scoped) for work that cannot fail.
    pub fn observe<T, F>(self, work: F) -> Result<T, ObservationError>
    where
        F: FnOnce(&mut Context) -> T,
    {
        self.scoped(|ctx| Ok::<T, ObservationError>(work(ctx)))
    }

    /// Async [`scoped`](Self::scoped).
    ///
    /// The work receives a [`ParentRef`] for starting nested observations. If
    /// the returned future is dropped before completion, the observation is
    /// dropped with it and takes the error path.
    pub async fn scoped_async<T, E, F, Fut>(mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(ParentRef) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ObservationError> + fmt::Display,
    {
        self.start()?;
        let outcome = work(self.context.as_parent()).await;
        self.complete(outcome)
    }

    fn complete<T, E>(&mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<ObservationError> + fmt::Display,
    {
        match outcome {
            Ok(value) => {
                self.stop()?;
                Ok(value)
            }
            Err(err) => {
                self.error(&err)?;
                Err(err)
            }
        }
    }

    fn finish(&mut self, error: Option<String>) {
        self.registry.apply_filters(&mut self.context);
        let errored = error.is_some();
        self.context.mark_finished(error);

        self.state = if errored {
            ObservationState::Errored
        } else {
            ObservationState::Stopped
        };
        self.context.seal();

        // Terminal state is committed before any handler runs.
        let handlers = std::mem::take(&mut self.handlers);
        let phase = if errored { Phase::Error } else { Phase::Stop };
        notify(&handlers, phase, &self.context);
        debug!(
            observation = %self.context.name(),
            id = %self.context.id().short(),
            state = %self.state,
            "Observation finished"
        );
    }

    fn expect_state(&self, expected: ObservationState, operation: &'static str) -> Result<(), ObservationError> {
        if self.state != expected {
            return Err(ObservationError::illegal_state(
                operation,
                self.state,
                self.context.name(),
            ));
        }
        Ok(())
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl Observation {
    fn abandon(&mut self) {
        if self.state == ObservationState::Started {
            warn!(
                observation = %self.context.name(),
                id = %self.context.id().short(),
                "Observation dropped while started"
            );
            self.finish(Some(ABANDONED_CAUSE.to_string()));
        }
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("context", &self.context)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
