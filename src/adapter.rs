// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Inbound request adapter.
//!
//! [`RequestObserver`] opens one `http.server.requests` observation per
//! request whose path matches a configured URL pattern and closes it when the
//! handler produces a response. Transport and routing stay with the caller:
//! requests and responses are plain values.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::observation::{Context, Observation, ObservationRegistry, ParentRef};
use crate::observed::CallSiteValues;

/// Observation name for inbound requests.
pub const REQUESTS_OBSERVATION: &str = "http.server.requests";

/// High-cardinality tag carrying the concrete request path.
pub const HTTP_URL_KEY: &str = "http.url";

/// Value of the `exception` tag when the handler succeeded.
pub const NO_EXCEPTION: &str = "none";

/// An inbound request, already parsed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRequest {
    pub method: String,
    pub path: String,
    /// Route template, e.g. `/user/{userId}`, when the router knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Path and query parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ServerRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            template: None,
            params: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl CallSiteValues for ServerRequest {
    fn value_of(&self, key: &str) -> Option<String> {
        self.param(key).map(str::to_string)
    }
}

/// The handler's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub status: u16,
    pub body: String,
}

impl ServerResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_status(self.status)
    }
}

/// Status class of a response, used as the `outcome` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

impl Outcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "INFORMATIONAL",
            Self::Success => "SUCCESS",
            Self::Redirection => "REDIRECTION",
            Self::ClientError => "CLIENT_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path pattern: exact, or a prefix when it ends in `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    raw: String,
}

impl UrlPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.raw.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == self.raw,
        }
    }
}

/// Wraps request handling in observations.
#[derive(Debug, Clone)]
pub struct RequestObserver {
    registry: Arc<ObservationRegistry>,
    patterns: Vec<UrlPattern>,
}

impl RequestObserver {
    pub fn new<I, S>(registry: &Arc<ObservationRegistry>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry: Arc::clone(registry),
            patterns: patterns.into_iter().map(UrlPattern::new).collect(),
        }
    }

    pub fn from_config(config: &ResolvedConfig, registry: &Arc<ObservationRegistry>) -> Self {
        Self::new(registry, config.url_patterns.iter().cloned())
    }

    pub fn patterns(&self) -> &[UrlPattern] {
        &self.patterns
    }

    /// The first pattern matching `path`.
    pub fn matching_pattern(&self, path: &str) -> Option<&UrlPattern> {
        self.patterns.iter().find(|p| p.matches(path))
    }

    /// Run `handler` for `request`, observed when the path matches.
    ///
    /// The handler receives the request and, when observed, a [`ParentRef`]
    /// for nesting its own observations. A handler error is tagged as a 500
    /// and returned unchanged.
    pub async fn handle<F, Fut>(&self, request: ServerRequest, handler: F) -> anyhow::Result<ServerResponse>
    where
        F: FnOnce(ServerRequest, Option<ParentRef>) -> Fut,
        Fut: Future<Output = anyhow::Result<ServerResponse>>,
    {
        let uri = match self.matching_pattern(&request.path) {
            Some(pattern) => request
                .template
                .clone()
                .unwrap_or_else(|| pattern.as_str().to_string()),
            None => {
                debug!(path = %request.path, "Request not observed");
                return handler(request, None).await;
            }
        };

        let mut observation = Observation::create(
            REQUESTS_OBSERVATION,
            format!("http {}", request.method.to_lowercase()),
            &self.registry,
        );
        observation.low_cardinality_key_value("method", request.method.to_uppercase())?;
        observation.low_cardinality_key_value("uri", uri)?;
        observation.high_cardinality_key_value(HTTP_URL_KEY, request.path.as_str())?;
        observation.start()?;

        let parent = observation.context().as_parent();
        match handler(request, Some(parent)).await {
            Ok(response) => {
                tag_response(observation.context_mut(), response.status, NO_EXCEPTION)?;
                observation.stop()?;
                Ok(response)
            }
            Err(err) => {
                tag_response(observation.context_mut(), 500, &exception_name(&err))?;
                observation.error(&err)?;
                Err(err)
            }
        }
    }
}

fn tag_response(context: &mut Context, status: u16, exception: &str) -> anyhow::Result<()> {
    context.add_low_cardinality_key_value("status", status.to_string())?;
    context.add_low_cardinality_key_value("outcome", Outcome::from_status(status).as_str())?;
    context.add_low_cardinality_key_value("exception", exception)?;
    Ok(())
}

fn exception_name(err: &anyhow::Error) -> String {
    err.root_cause().to_string()
}
