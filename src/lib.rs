// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Observe - observation context propagation.
//!
//! Wraps units of work (requests, service calls, method invocations) in
//! named, tagged, timed observations and broadcasts their lifecycle to
//! pluggable handlers.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`observation`] - Context, handlers, registry and the observation state machine
//! - [`observed`] - Declarative observation of functions
//! - [`handlers`] - Built-in logging, span and metrics handlers
//! - [`adapter`] - Inbound request adapter
//! - [`demo`] - User-name lookup wired through the adapter
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Subscriber setup and the in-process metrics store
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use observe::config::{load_config, CliOptions};
//! use observe::telemetry::GLOBAL_METRICS;
//! use observe::Observation;
//!
//! let config = load_config(".".as_ref(), CliOptions::default())?;
//! let registry = Arc::new(config.build_registry(&GLOBAL_METRICS));
//!
//! let name = Observation::create("user.name", "getting-user-name", &registry)
//!     .observe(|_ctx| "foo")?;
//! ```

pub mod adapter;
pub mod config;
pub mod demo;
pub mod error;
pub mod handlers;
pub mod observation;
pub mod observed;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use error::{ConfigError, HandlerError, ObservationError, Result};
pub use observation::{
    Cardinality, Context, Event, KeyValue, KeyValues, Observation, ObservationHandler,
    ObservationRegistry, ObservationState, ParentRef, UNKNOWN,
};
pub use observed::{observed, Observed, ObservedSpec};

/// Observe version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let registry = Arc::new(ObservationRegistry::new());
        let observation = Observation::create("op", "", &registry);
        assert_eq!(observation.state(), ObservationState::Created);
        assert_eq!(KeyValue::new("k", "v").to_string(), "k=v");
    }
}
