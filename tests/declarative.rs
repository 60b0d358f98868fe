// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Declarative observation through specs, the decorator and config tables.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use observe::config::{load_config, CliOptions};
use observe::demo::{UserService, USER_NAME_METHOD};
use observe::{
    observed, Context, HandlerError, ObservationHandler, ObservationRegistry, ObservedSpec, UNKNOWN,
};
use tempfile::TempDir;

/// Keeps the low-cardinality tags each observation finished with.
#[derive(Default)]
struct Finished {
    tags: Mutex<Vec<(String, Vec<String>)>>,
}

impl Finished {
    fn record(&self, context: &Context) {
        let tags = context
            .low_cardinality_key_values()
            .iter()
            .map(|kv| kv.to_string())
            .collect();
        self.tags.lock().unwrap().push((context.name().to_string(), tags));
    }

    fn all(&self) -> Vec<(String, Vec<String>)> {
        self.tags.lock().unwrap().clone()
    }
}

impl ObservationHandler for Finished {
    fn on_start(&self, _context: &Context) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_stop(&self, context: &Context) -> Result<(), HandlerError> {
        self.record(context);
        Ok(())
    }

    fn on_error(&self, context: &Context) -> Result<(), HandlerError> {
        self.record(context);
        Ok(())
    }
}

fn setup() -> (Arc<Finished>, Arc<ObservationRegistry>) {
    let finished = Arc::new(Finished::default());
    let registry = ObservationRegistry::new();
    registry.register_arc(finished.clone());
    (finished, Arc::new(registry))
}

#[test]
fn decorator_resolves_declared_keys_from_arguments() {
    let (finished, registry) = setup();
    let spec = ObservedSpec::new("orders.place")
        .low_cardinality_key_value("service", "orders")
        .low_cardinality_key("region")
        .low_cardinality_key("tier");

    let place = observed(spec, &registry, |args: HashMap<String, String>| {
        Ok::<_, anyhow::Error>(args.len())
    });

    let mut args = HashMap::new();
    args.insert("region".to_string(), "eu".to_string());
    assert_eq!(place(args).unwrap(), 1);

    assert_eq!(
        finished.all(),
        vec![(
            "orders.place".to_string(),
            vec![
                "service=orders".to_string(),
                "region=eu".to_string(),
                format!("tier={UNKNOWN}"),
            ]
        )]
    );
}

#[test]
fn decorator_propagates_work_errors() {
    let (finished, registry) = setup();
    let fail = observed(ObservedSpec::new("fails"), &registry, |_: ()| {
        Err::<(), _>(anyhow::anyhow!("invalid order"))
    });

    let err = fail(()).unwrap_err();
    assert_eq!(err.to_string(), "invalid order");
    assert_eq!(finished.all().len(), 1);
}

#[test]
fn json_arguments_feed_tags() {
    let (finished, registry) = setup();
    let spec = ObservedSpec::new("search").low_cardinality_key("page");
    let search = observed(spec, &registry, |_args: serde_json::Value| Ok::<_, anyhow::Error>(()));

    search(serde_json::json!({"page": 3})).unwrap();
    assert_eq!(finished.all()[0].1, vec!["page=3".to_string()]);
}

#[tokio::test]
async fn config_table_overrides_service_spec() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(".observe.json"),
        r#"{
            "maxLatencyMs": 0,
            "observed": {
                "UserService.userName": {
                    "name": "users.lookup",
                    "contextualName": "lookup",
                    "lowCardinalityKeyValues": ["userType", "premium"]
                }
            }
        }"#,
    )
    .unwrap();

    let config = load_config(temp.path(), CliOptions::default()).unwrap();
    assert!(config.observed.get(USER_NAME_METHOD).is_some());

    let (finished, registry) = setup();
    let service = UserService::from_config(&config, &registry);
    assert_eq!(service.user_name(None, "9").await.unwrap(), "foo");

    assert_eq!(
        finished.all(),
        vec![("users.lookup".to_string(), vec!["userType=premium".to_string()])]
    );
}
