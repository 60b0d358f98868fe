// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Observation context: the data every handler sees.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::ObservationId;
use super::key_value::{Cardinality, KeyValue, KeyValues};
use super::lifecycle::ObservationState;
use crate::error::ObservationError;

/// Mutable record describing one observation instance.
///
/// A context accepts tags until its observation reaches a terminal state.
/// After that it is sealed and every mutation returns
/// [`ObservationError::IllegalState`] naming the terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    id: ObservationId,
    name: String,
    contextual_name: String,
    low_cardinality: KeyValues,
    high_cardinality: KeyValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<ParentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    started: Option<Instant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    sealed: bool,
}

impl Context {
    /// Create a context with empty tag collections.
    pub fn new(name: impl Into<String>, contextual_name: impl Into<String>) -> Self {
        Self {
            id: ObservationId::new(),
            name: name.into(),
            contextual_name: contextual_name.into(),
            low_cardinality: KeyValues::new(),
            high_cardinality: KeyValues::new(),
            parent: None,
            started_at: None,
            started: None,
            duration: None,
            error: None,
            sealed: false,
        }
    }

    pub fn id(&self) -> ObservationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-oriented label. May be empty.
    pub fn contextual_name(&self) -> &str {
        &self.contextual_name
    }

    /// Contextual name, falling back to the name when empty.
    pub fn display_name(&self) -> &str {
        if self.contextual_name.is_empty() {
            &self.name
        } else {
            &self.contextual_name
        }
    }

    pub fn set_contextual_name(&mut self, contextual_name: impl Into<String>) -> Result<(), ObservationError> {
        self.ensure_open("rename")?;
        self.contextual_name = contextual_name.into();
        Ok(())
    }

    /// Append a tag. Existing entries with the same key are kept.
    pub fn add_key_value(
        &mut self,
        cardinality: Cardinality,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.ensure_open("add tag to")?;
        let key_value = KeyValue::new(key, value);
        match cardinality {
            Cardinality::Low => self.low_cardinality.push(key_value),
            Cardinality::High => self.high_cardinality.push(key_value),
        }
        Ok(())
    }

    pub fn add_low_cardinality_key_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.add_key_value(Cardinality::Low, key, value)
    }

    pub fn add_high_cardinality_key_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ObservationError> {
        self.add_key_value(Cardinality::High, key, value)
    }

    /// Append every tag from `key_values`, stopping at the first rejection.
    pub fn add_key_values<'a>(
        &mut self,
        cardinality: Cardinality,
        key_values: impl IntoIterator<Item = &'a KeyValue>,
    ) -> Result<(), ObservationError> {
        for kv in key_values {
            self.add_key_value(cardinality, kv.key(), kv.value())?;
        }
        Ok(())
    }

    pub fn key_values(&self, cardinality: Cardinality) -> &KeyValues {
        match cardinality {
            Cardinality::Low => &self.low_cardinality,
            Cardinality::High => &self.high_cardinality,
        }
    }

    pub fn low_cardinality_key_values(&self) -> &KeyValues {
        &self.low_cardinality
    }

    pub fn high_cardinality_key_values(&self) -> &KeyValues {
        &self.high_cardinality
    }

    /// First low-cardinality value for `key`, or [`UNKNOWN`](super::UNKNOWN).
    pub fn low_cardinality_value(&self, key: &str) -> &str {
        self.low_cardinality.value_or_unknown(key)
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: ParentRef) {
        self.parent = Some(parent);
    }

    /// Reference to this context for use as a parent of nested observations.
    pub fn as_parent(&self) -> ParentRef {
        ParentRef {
            id: self.id,
            name: self.name.clone(),
            contextual_name: self.contextual_name.clone(),
        }
    }

    /// Wall-clock time of the start notification.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Time since start, frozen at the terminal transition.
    pub fn duration(&self) -> Option<Duration> {
        self.duration.or_else(|| self.started.map(|s| s.elapsed()))
    }

    /// Display text of the error cause, once the error path fired.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
        self.started = Some(Instant::now());
    }

    pub(crate) fn mark_finished(&mut self, error: Option<String>) {
        self.duration = self.started.map(|s| s.elapsed());
        if error.is_some() {
            self.error = error;
        }
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Only a terminal observation seals its context, and only the error
    /// path records a cause.
    fn ensure_open(&self, operation: &'static str) -> Result<(), ObservationError> {
        if self.sealed {
            let state = if self.error.is_some() {
                ObservationState::Errored
            } else {
                ObservationState::Stopped
            };
            return Err(ObservationError::illegal_state(operation, state, &self.name));
        }
        Ok(())
    }
}

/// Link from a child context to the observation it was started under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub id: ObservationId,
    pub name: String,
    pub contextual_name: String,
}

/// A point-in-time occurrence inside a started observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub name: String,
    pub contextual_name: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            contextual_name: name.clone(),
            name,
            timestamp: Utc::now(),
        }
    }

    pub fn with_contextual_name(mut self, contextual_name: impl Into<String>) -> Self {
        self.contextual_name = contextual_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::UNKNOWN;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = Context::new("user.name", "getting-user-name");
        assert_eq!(ctx.name(), "user.name");
        assert_eq!(ctx.contextual_name(), "getting-user-name");
        assert!(ctx.low_cardinality_key_values().is_empty());
        assert!(ctx.high_cardinality_key_values().is_empty());
        assert!(ctx.parent().is_none());
        assert!(ctx.started_at().is_none());
        assert!(ctx.duration().is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let ctx = Context::new("user.name", "");
        assert_eq!(ctx.display_name(), "user.name");
    }

    #[test]
    fn test_tags_by_cardinality() {
        let mut ctx = Context::new("user.name", "");
        ctx.add_low_cardinality_key_value("userType", "userType2").unwrap();
        ctx.add_high_cardinality_key_value("userId", "42").unwrap();

        assert_eq!(ctx.key_values(Cardinality::Low).len(), 1);
        assert_eq!(ctx.key_values(Cardinality::High).len(), 1);
        assert_eq!(ctx.low_cardinality_value("userType"), "userType2");
        // High-cardinality tags are not consulted by the low-cardinality lookup.
        assert_eq!(ctx.low_cardinality_value("userId"), UNKNOWN);
    }

    #[test]
    fn test_sealed_context_rejects_mutation() {
        let mut ctx = Context::new("user.name", "");
        ctx.seal();

        let err = ctx.add_low_cardinality_key_value("userType", "x").unwrap_err();
        assert!(err.is_illegal_state());
        assert!(err.to_string().contains("STOPPED"));
        assert!(ctx.set_contextual_name("other").is_err());
        assert!(ctx.low_cardinality_key_values().is_empty());
    }

    #[test]
    fn test_duration_frozen_on_finish() {
        let mut ctx = Context::new("op", "");
        ctx.mark_started();
        std::thread::sleep(Duration::from_millis(2));
        ctx.mark_finished(Some("boom".to_string()));
        let frozen = ctx.duration().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(ctx.duration(), Some(frozen));
        assert_eq!(ctx.error(), Some("boom"));
    }

    #[test]
    fn test_as_parent() {
        let ctx = Context::new("http.server.requests", "http get");
        let parent = ctx.as_parent();
        assert_eq!(parent.id, ctx.id());
        assert_eq!(parent.name, "http.server.requests");
    }

    #[test]
    fn test_serialize_skips_runtime_fields() {
        let mut ctx = Context::new("user.name", "getting-user-name");
        ctx.add_low_cardinality_key_value("userType", "userType2").unwrap();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["name"], "user.name");
        assert_eq!(json["lowCardinality"][0]["key"], "userType");
        assert!(json.get("sealed").is_none());
    }
}
