// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core observation engine.
//!
//! An [`Observation`] wraps a unit of work in a named, tagged [`Context`] and
//! broadcasts its lifecycle to the handlers of an [`ObservationRegistry`]:
//!
//! ```text
//! CREATED --start--> STARTED --stop--> STOPPED
//!                            \--error-> ERRORED
//! ```
//!
//! - Handlers run in registration order for every phase.
//! - `supports_context` is evaluated once, at start, so a handler that saw
//!   `on_start` always sees the terminal callback.
//! - A failing handler is logged and skipped; the observation carries on.
//! - Errors from the observed work are returned to the caller unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use observe::observation::{Observation, ObservationRegistry};
//! use observe::handlers::LoggingHandler;
//!
//! let registry = ObservationRegistry::new();
//! registry.register(LoggingHandler::default());
//! let registry = Arc::new(registry);
//!
//! let mut observation = Observation::create("user.name", "getting-user-name", &registry);
//! observation.low_cardinality_key_value("userType", "userType2")?;
//! let name = observation.observe(|_ctx| "foo")?;
//! ```

mod context;
mod handler;
mod id;
mod key_value;
mod lifecycle;
mod registry;

pub use context::{Context, Event, ParentRef};
pub use handler::{ObservationHandler, Phase};
pub use id::ObservationId;
pub use key_value::{Cardinality, KeyValue, KeyValues, UNKNOWN};
pub use lifecycle::{Observation, ObservationState, ABANDONED_CAUSE};
pub use registry::{CommonTagsFilter, ObservationFilter, ObservationRegistry, ObservationRegistryBuilder};
