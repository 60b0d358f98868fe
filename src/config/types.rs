// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`WorkspaceConfig`] is what a file contains (every field optional);
//! [`ResolvedConfig`] is the merged result with defaults filled in.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use tracing::Level;

use crate::handlers::{LoggingHandler, MetricsHandler, SpanHandler, DEFAULT_TAG_KEY};
use crate::observation::{CommonTagsFilter, KeyValue, KeyValues, ObservationRegistry};
use crate::observed::ObservedTable;
use crate::telemetry::Metrics;

/// Default request adapter URL patterns.
pub const DEFAULT_URL_PATTERNS: &[&str] = &["/user/*"];

/// Default ceiling for the demo service's simulated latency.
pub const DEFAULT_MAX_LATENCY_MS: u64 = 200;

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
}

/// Handler toggles as written in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlersConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spans: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<bool>,
}

/// Which built-in handlers to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlersConfig {
    pub logging: bool,
    pub spans: bool,
    pub metrics: bool,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            logging: true,
            spans: false,
            metrics: true,
        }
    }
}

/// Configuration as read from a single file.
/// Can be defined in .observe.json or .observe/config.json in the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handlers: Option<HandlersConfigPartial>,

    /// Tag the logging handler looks up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging_tag_key: Option<String>,

    /// Low-cardinality tags added to every observation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_tags: Option<BTreeMap<String, String>>,

    /// Observation declarations keyed by method name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<ObservedTable>,

    /// Request paths the request adapter observes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    #[serde(serialize_with = "serialize_level")]
    pub log_level: Level,
    pub log_format: LogFormat,
    pub handlers: HandlersConfig,
    pub logging_tag_key: String,
    pub common_tags: KeyValues,
    pub observed: ObservedTable,
    pub url_patterns: Vec<String>,
    pub max_latency_ms: u64,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_format: LogFormat::default(),
            handlers: HandlersConfig::default(),
            logging_tag_key: DEFAULT_TAG_KEY.to_string(),
            common_tags: KeyValues::new(),
            observed: ObservedTable::new(),
            url_patterns: DEFAULT_URL_PATTERNS.iter().map(|p| p.to_string()).collect(),
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
        }
    }
}

impl ResolvedConfig {
    /// Build a registry with the enabled built-in handlers.
    ///
    /// Handler order: logging, spans, metrics. Common tags become a filter.
    pub fn build_registry(&self, metrics: &Arc<Metrics>) -> ObservationRegistry {
        let mut builder = ObservationRegistry::builder();

        if self.handlers.logging {
            builder.register(LoggingHandler::new(&self.logging_tag_key));
        }
        if self.handlers.spans {
            builder.register(SpanHandler::new());
        }
        if self.handlers.metrics {
            builder.register(MetricsHandler::new(Arc::clone(metrics)));
        }
        if !self.common_tags.is_empty() {
            builder.filter(CommonTagsFilter::new(self.common_tags.clone()));
        }

        builder.build()
    }
}

pub(crate) fn common_tags_from_map(map: &BTreeMap<String, String>) -> KeyValues {
    map.iter().map(|(k, v)| KeyValue::new(k, v)).collect()
}

fn serialize_level<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(level)
}
