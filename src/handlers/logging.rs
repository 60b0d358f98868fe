// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handler that logs before and after every observation.

use tracing::{info, warn};

use crate::error::HandlerError;
use crate::observation::{Context, ObservationHandler};

/// Tag looked up by default when logging an observation.
pub const DEFAULT_TAG_KEY: &str = "userType";

/// Logs one line when an observation starts and one when it finishes.
///
/// Each line carries the context name and the first low-cardinality value for
/// the configured tag key (or `UNKNOWN`).
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    tag_key: String,
}

impl LoggingHandler {
    pub fn new(tag_key: impl Into<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
        }
    }

    pub fn tag_key(&self) -> &str {
        &self.tag_key
    }

    /// Text of the start line.
    pub fn before_message(&self, context: &Context) -> String {
        format!(
            "Before running the observation for context [{}], {} [{}]",
            context.name(),
            self.tag_key,
            context.low_cardinality_value(&self.tag_key)
        )
    }

    /// Text of the stop line.
    pub fn after_message(&self, context: &Context) -> String {
        format!(
            "After running the observation for context [{}], {} [{}]",
            context.name(),
            self.tag_key,
            context.low_cardinality_value(&self.tag_key)
        )
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_KEY)
    }
}

impl ObservationHandler for LoggingHandler {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_start(&self, context: &Context) -> Result<(), HandlerError> {
        info!(id = %context.id().short(), "{}", self.before_message(context));
        Ok(())
    }

    fn on_stop(&self, context: &Context) -> Result<(), HandlerError> {
        info!(id = %context.id().short(), "{}", self.after_message(context));
        Ok(())
    }

    fn on_error(&self, context: &Context) -> Result<(), HandlerError> {
        warn!(
            id = %context.id().short(),
            error = context.error().unwrap_or_default(),
            "{}",
            self.after_message(context)
        );
        Ok(())
    }
}
