// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::str::FromStr;

use tracing::Level;

use super::types::{common_tags_from_map, LogFormat, ResolvedConfig, WorkspaceConfig};
use crate::error::ConfigError;

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub spans: Option<bool>,
    pub max_latency_ms: Option<u64>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.observe.local.json)
/// 3. Workspace config (.observe.json)
/// 4. Global config (~/.observe/config.json)
/// 5. Default values
///
/// Common tags and observed tables accumulate across layers; later layers win
/// on key collisions.
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let mut result = default_config();
    let mut common_tags = std::collections::BTreeMap::new();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &mut common_tags, config)?;
    }
    result.common_tags = common_tags_from_map(&common_tags);

    apply_cli_options(&mut result, &cli)?;

    Ok(result)
}

fn apply_workspace_config(
    result: &mut ResolvedConfig,
    common_tags: &mut std::collections::BTreeMap<String, String>,
    config: WorkspaceConfig,
) -> Result<(), ConfigError> {
    if let Some(ref level) = config.log_level {
        result.log_level = parse_level(level)?;
    }

    if let Some(format) = config.log_format {
        result.log_format = format;
    }

    if let Some(handlers) = config.handlers {
        if let Some(logging) = handlers.logging {
            result.handlers.logging = logging;
        }
        if let Some(spans) = handlers.spans {
            result.handlers.spans = spans;
        }
        if let Some(metrics) = handlers.metrics {
            result.handlers.metrics = metrics;
        }
    }

    if let Some(key) = config.logging_tag_key {
        result.logging_tag_key = key;
    }

    if let Some(tags) = config.common_tags {
        common_tags.extend(tags);
    }

    if let Some(observed) = config.observed {
        result.observed.merge(observed);
    }

    if let Some(patterns) = config.url_patterns {
        result.url_patterns = patterns;
    }

    if let Some(max_latency_ms) = config.max_latency_ms {
        result.max_latency_ms = max_latency_ms;
    }

    Ok(())
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) -> Result<(), ConfigError> {
    if let Some(ref level) = cli.log_level {
        result.log_level = parse_level(level)?;
    }

    if let Some(format) = cli.log_format {
        result.log_format = format;
    }

    if let Some(spans) = cli.spans {
        result.handlers.spans = spans;
    }

    if let Some(max_latency_ms) = cli.max_latency_ms {
        result.max_latency_ms = max_latency_ms;
    }

    Ok(())
}

fn parse_level(level: &str) -> Result<Level, ConfigError> {
    Level::from_str(level).map_err(|_| ConfigError::InvalidValue {
        field: "logLevel".to_string(),
        message: format!("unknown log level '{level}'"),
    })
}
