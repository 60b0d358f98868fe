// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the observation engine.
//!
//! Three kinds of failure flow through the crate:
//!
//! - [`ObservationError`] - misuse of the observation state machine. These are
//!   programmer errors and are always returned to the caller.
//! - [`HandlerError`] - raised by a pluggable handler. Caught and logged at the
//!   dispatch boundary, never returned to the caller.
//! - work errors - whatever the observed unit of work returns. These pass through
//!   [`Observation::scoped`](crate::observation::Observation::scoped) unchanged.

use thiserror::Error;

use crate::observation::ObservationState;

/// Errors raised by the observation state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    #[error("Illegal state: cannot {operation} observation '{observation}' in state {state}")]
    IllegalState {
        operation: &'static str,
        state: ObservationState,
        observation: String,
    },
}

impl ObservationError {
    pub(crate) fn illegal_state(
        operation: &'static str,
        state: ObservationState,
        observation: impl Into<String>,
    ) -> Self {
        Self::IllegalState {
            operation,
            state,
            observation: observation.into(),
        }
    }

    /// Check if this error is an invalid lifecycle transition or a mutation
    /// of a terminal observation's context.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }
}

/// Errors raised inside a handler callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler rejected context: {reason}")]
    Rejected { reason: String },
}

impl HandlerError {
    /// Create a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_state_display() {
        let err = ObservationError::illegal_state("stop", ObservationState::Created, "user.name");
        let display = err.to_string();
        assert!(display.contains("stop"));
        assert!(display.contains("user.name"));
        assert!(display.contains("CREATED"));
        assert!(err.is_illegal_state());
    }

    #[test]
    fn test_mutation_after_terminal_is_illegal_state() {
        let err = ObservationError::illegal_state("add tag to", ObservationState::Errored, "user.name");
        assert!(err.is_illegal_state());
        assert_eq!(
            err.to_string(),
            "Illegal state: cannot add tag to observation 'user.name' in state ERRORED"
        );
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::failed("sink unavailable");
        assert_eq!(err.to_string(), "Handler failed: sink unavailable");
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_anyhow_accepts_observation_error() {
        let err: anyhow::Error =
            ObservationError::illegal_state("start", ObservationState::Started, "x").into();
        assert!(err.downcast_ref::<ObservationError>().is_some());
    }
}
