// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Demo application: a user-name lookup behind the request adapter.
//!
//! `GET /user/{userId}` goes through [`RequestObserver`], the controller logs
//! and delegates to [`UserService::user_name`], which runs inside its own
//! `user.name` observation nested under the request.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::adapter::{RequestObserver, ServerRequest, ServerResponse};
use crate::config::ResolvedConfig;
use crate::observation::{ObservationRegistry, ParentRef};
use crate::observed::{Observed, ObservedSpec};

/// Key of the user-name lookup in an observed table.
pub const USER_NAME_METHOD: &str = "UserService.userName";

/// Route template served by the demo controller.
pub const USER_ROUTE: &str = "/user/{userId}";

/// Declaration used when the config does not override [`USER_NAME_METHOD`].
pub fn user_name_spec() -> ObservedSpec {
    ObservedSpec::new("user.name")
        .contextual_name("getting-user-name")
        .low_cardinality_key_value("userType", "userType2")
}

/// Looks up user names with simulated latency.
#[derive(Debug, Clone)]
pub struct UserService {
    observed: Observed,
    max_latency: Duration,
}

impl UserService {
    pub fn new(observed: Observed, max_latency: Duration) -> Self {
        Self {
            observed,
            max_latency,
        }
    }

    pub fn from_config(config: &ResolvedConfig, registry: &Arc<ObservationRegistry>) -> Self {
        let observed = config
            .observed
            .bind_or(USER_NAME_METHOD, user_name_spec(), registry);
        Self::new(observed, Duration::from_millis(config.max_latency_ms))
    }

    pub fn observed(&self) -> &Observed {
        &self.observed
    }

    pub async fn user_name(&self, parent: Option<ParentRef>, user_id: &str) -> anyhow::Result<String> {
        let latency = self.latency();
        let id = user_id.to_string();
        self.observed
            .call_async(parent, &[("userId", user_id)], |_parent| async move {
                info!(user_id = %id, "Getting user name for user with id <{id}>");
                tokio::time::sleep(latency).await;
                Ok("foo".to_string())
            })
            .await
    }

    fn latency(&self) -> Duration {
        let max_ms = u64::try_from(self.max_latency.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(fastrand::u64(0..max_ms))
    }
}

/// Request handler for [`USER_ROUTE`].
#[derive(Debug, Clone)]
pub struct UserController {
    service: Arc<UserService>,
}

impl UserController {
    pub fn new(service: Arc<UserService>) -> Self {
        Self { service }
    }

    pub async fn user_name(
        &self,
        request: ServerRequest,
        parent: Option<ParentRef>,
    ) -> anyhow::Result<ServerResponse> {
        info!(path = %request.path, "Got a request");

        let user_id = match request.param("userId") {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Ok(ServerResponse::new(400, "missing userId")),
        };
        let name = self.service.user_name(parent, &user_id).await?;
        Ok(ServerResponse::ok(name))
    }
}

/// Build a `GET /user/{userId}` request.
pub fn user_request(user_id: &str) -> ServerRequest {
    ServerRequest::get(format!("/user/{user_id}"))
        .with_template(USER_ROUTE)
        .with_param("userId", user_id)
}

/// The demo's request path, wired end to end.
#[derive(Debug, Clone)]
pub struct DemoApp {
    observer: Arc<RequestObserver>,
    controller: Arc<UserController>,
}

impl DemoApp {
    pub fn new(config: &ResolvedConfig, registry: &Arc<ObservationRegistry>) -> Self {
        let service = Arc::new(UserService::from_config(config, registry));
        Self {
            observer: Arc::new(RequestObserver::from_config(config, registry)),
            controller: Arc::new(UserController::new(service)),
        }
    }

    /// Serve one request through the observer and controller.
    pub async fn serve(&self, request: ServerRequest) -> anyhow::Result<ServerResponse> {
        let controller = Arc::clone(&self.controller);
        self.observer
            .handle(request, |req, parent| async move {
                controller.user_name(req, parent).await
            })
            .await
    }

    /// Serve `requests` concurrent lookups of `user_id`.
    pub async fn run(&self, user_id: &str, requests: usize) -> anyhow::Result<Vec<ServerResponse>> {
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..requests {
            let app = self.clone();
            let request = user_request(user_id);
            tasks.spawn(async move { app.serve(request).await });
        }

        let mut responses = Vec::with_capacity(requests);
        while let Some(joined) = tasks.join_next().await {
            responses.push(joined??);
        }
        Ok(responses)
    }
}
