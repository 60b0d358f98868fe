// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Declarative observation of functions.
//!
//! An [`ObservedSpec`] declares how a function is observed: the observation
//! name, the contextual name, static low-cardinality tags, and the argument
//! names whose call-site values become tags. [`Observed`] binds a spec to a
//! registry and runs work through [`Observation::scoped`]; [`observed`] wraps
//! a function into one that observes itself.
//!
//! Specs can also be loaded from configuration into an [`ObservedTable`] keyed
//! by method name.
//!
//! # Example
//!
//! ```rust,ignore
//! let spec = ObservedSpec::new("user.name")
//!     .contextual_name("getting-user-name")
//!     .low_cardinality_key_value("userType", "userType2");
//!
//! let user_name = observed(spec, &registry, |args: HashMap<String, String>| {
//!     Ok::<_, anyhow::Error>("foo".to_string())
//! });
//! let name = user_name(args)?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ObservationError;
use crate::observation::{
    Cardinality, Context, KeyValue, KeyValues, Observation, ObservationRegistry, ParentRef, UNKNOWN,
};

/// Values available at a call site, looked up by argument name.
pub trait CallSiteValues {
    fn value_of(&self, key: &str) -> Option<String>;
}

impl CallSiteValues for () {
    fn value_of(&self, _key: &str) -> Option<String> {
        None
    }
}

impl CallSiteValues for HashMap<String, String> {
    fn value_of(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl CallSiteValues for BTreeMap<String, String> {
    fn value_of(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<K: AsRef<str>, V: ToString> CallSiteValues for [(K, V)] {
    fn value_of(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.to_string())
    }
}

impl<K: AsRef<str>, V: ToString, const N: usize> CallSiteValues for [(K, V); N] {
    fn value_of(&self, key: &str) -> Option<String> {
        self.as_slice().value_of(key)
    }
}

impl CallSiteValues for serde_json::Value {
    fn value_of(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl<T: CallSiteValues + ?Sized> CallSiteValues for &T {
    fn value_of(&self, key: &str) -> Option<String> {
        (**self).value_of(key)
    }
}

/// Static observation declaration attached to a function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedSpec {
    /// Observation name (metric name).
    pub name: String,

    /// Contextual name (span name).
    #[serde(default)]
    pub contextual_name: String,

    /// Static low-cardinality tags, written as flat `[key, value, ...]` pairs.
    #[serde(default, with = "flat_pairs", skip_serializing_if = "KeyValues::is_empty")]
    pub low_cardinality_key_values: KeyValues,

    /// Argument names resolved into low-cardinality tags at the call site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub low_cardinality_keys: Vec<String>,

    /// Argument names resolved into high-cardinality tags at the call site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_cardinality_keys: Vec<String>,
}

impl ObservedSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn contextual_name(mut self, contextual_name: impl Into<String>) -> Self {
        self.contextual_name = contextual_name.into();
        self
    }

    pub fn low_cardinality_key_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.low_cardinality_key_values.push(KeyValue::new(key, value));
        self
    }

    pub fn low_cardinality_key(mut self, key: impl Into<String>) -> Self {
        self.low_cardinality_keys.push(key.into());
        self
    }

    pub fn high_cardinality_key(mut self, key: impl Into<String>) -> Self {
        self.high_cardinality_keys.push(key.into());
        self
    }

    /// Build the context for one call.
    ///
    /// Static tags come first, then resolved keys in declaration order. A
    /// declared low-cardinality key missing from `values` is tagged
    /// [`UNKNOWN`] so the tag set stays stable; a missing high-cardinality key
    /// is left out.
    pub fn build_context<A: CallSiteValues + ?Sized>(&self, values: &A) -> Result<Context, ObservationError> {
        let mut context = Context::new(&self.name, &self.contextual_name);
        context.add_key_values(Cardinality::Low, &self.low_cardinality_key_values)?;

        for key in &self.low_cardinality_keys {
            let value = values.value_of(key).unwrap_or_else(|| UNKNOWN.to_string());
            context.add_low_cardinality_key_value(key, value)?;
        }
        for key in &self.high_cardinality_keys {
            if let Some(value) = values.value_of(key) {
                context.add_high_cardinality_key_value(key, value)?;
            }
        }
        Ok(context)
    }
}

/// An [`ObservedSpec`] bound to a registry.
#[derive(Debug, Clone)]
pub struct Observed {
    spec: ObservedSpec,
    registry: Arc<ObservationRegistry>,
}

impl Observed {
    pub fn new(spec: ObservedSpec, registry: &Arc<ObservationRegistry>) -> Self {
        Self {
            spec,
            registry: Arc::clone(registry),
        }
    }

    pub fn spec(&self) -> &ObservedSpec {
        &self.spec
    }

    /// Create (but do not start) the observation for one call.
    pub fn observation<A: CallSiteValues + ?Sized>(
        &self,
        parent: Option<ParentRef>,
        values: &A,
    ) -> Result<Observation, ObservationError> {
        let observation = Observation::from_context(self.spec.build_context(values)?, &self.registry);
        Ok(match parent {
            Some(parent) => observation.parent_ref(parent),
            None => observation,
        })
    }

    /// Run `work` inside an observation built from `values`.
    pub fn call<A, T, E, F>(&self, values: &A, work: F) -> Result<T, E>
    where
        A: CallSiteValues + ?Sized,
        F: FnOnce(&mut Context) -> Result<T, E>,
        E: From<ObservationError> + fmt::Display,
    {
        self.observation(None, values)?.scoped(work)
    }

    /// Async [`call`](Self::call), optionally nested under `parent`.
    pub async fn call_async<A, T, E, F, Fut>(
        &self,
        parent: Option<ParentRef>,
        values: &A,
        work: F,
    ) -> Result<T, E>
    where
        A: CallSiteValues + ?Sized,
        F: FnOnce(ParentRef) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ObservationError> + fmt::Display,
    {
        self.observation(parent, values)?.scoped_async(work).await
    }
}

/// Wrap `f` so every call runs inside an observation described by `spec`.
///
/// The argument doubles as the call-site values for tag resolution.
pub fn observed<A, T, E, F>(
    spec: ObservedSpec,
    registry: &Arc<ObservationRegistry>,
    f: F,
) -> impl Fn(A) -> Result<T, E>
where
    A: CallSiteValues,
    F: Fn(A) -> Result<T, E>,
    E: From<ObservationError> + fmt::Display,
{
    let observed = Observed::new(spec, registry);
    move |args: A| {
        let observation = observed.observation(None, &args)?;
        observation.scoped(|_ctx| f(args))
    }
}

/// Observation declarations keyed by method name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservedTable(BTreeMap<String, ObservedSpec>);

impl ObservedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: impl Into<String>, spec: ObservedSpec) -> Option<ObservedSpec> {
        self.0.insert(method.into(), spec)
    }

    pub fn get(&self, method: &str) -> Option<&ObservedSpec> {
        self.0.get(method)
    }

    /// Bind the spec for `method`, falling back to `default` when the table has none.
    pub fn bind_or(
        &self,
        method: &str,
        default: ObservedSpec,
        registry: &Arc<ObservationRegistry>,
    ) -> Observed {
        let spec = self.get(method).cloned().unwrap_or(default);
        Observed::new(spec, registry)
    }

    /// Layer `other` on top of this table; entries in `other` win.
    pub fn merge(&mut self, other: ObservedTable) {
        self.0.extend(other.0);
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

mod flat_pairs {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::observation::KeyValues;

    pub fn serialize<S: Serializer>(key_values: &KeyValues, serializer: S) -> Result<S::Ok, S::Error> {
        let flat: Vec<&str> = key_values
            .iter()
            .flat_map(|kv| [kv.key(), kv.value()])
            .collect();
        flat.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<KeyValues, D::Error> {
        let flat = Vec::<String>::deserialize(deserializer)?;
        if flat.len() % 2 != 0 {
            return Err(D::Error::custom(format!(
                "key/value list must have an even number of entries, got {}",
                flat.len()
            )));
        }
        Ok(KeyValues::from_flat(&flat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_name_spec() -> ObservedSpec {
        ObservedSpec::new("user.name")
            .contextual_name("getting-user-name")
            .low_cardinality_key_value("userType", "userType2")
    }

    #[test]
    fn test_build_context_static_tags() {
        let ctx = user_name_spec().build_context(&()).unwrap();
        assert_eq!(ctx.name(), "user.name");
        assert_eq!(ctx.contextual_name(), "getting-user-name");
        assert_eq!(ctx.low_cardinality_value("userType"), "userType2");
    }

    #[test]
    fn test_build_context_resolves_keys() {
        let spec = ObservedSpec::new("user.name")
            .low_cardinality_key("region")
            .low_cardinality_key("tier")
            .high_cardinality_key("userId")
            .high_cardinality_key("sessionId");

        let ctx = spec
            .build_context(&[("region", "eu"), ("userId", "42")])
            .unwrap();

        assert_eq!(ctx.low_cardinality_value("region"), "eu");
        assert_eq!(ctx.low_cardinality_value("tier"), UNKNOWN);
        assert_eq!(ctx.high_cardinality_key_values().len(), 1);
        assert_eq!(ctx.high_cardinality_key_values().value_or_unknown("userId"), "42");
    }

    #[test]
    fn test_json_call_site_values() {
        let args = serde_json::json!({"userId": 42, "name": "ada", "missing": null});
        assert_eq!(args.value_of("userId"), Some("42".to_string()));
        assert_eq!(args.value_of("name"), Some("ada".to_string()));
        assert_eq!(args.value_of("missing"), None);
        assert_eq!(args.value_of("absent"), None);
    }

    #[test]
    fn test_spec_deserializes_flat_pairs() {
        let spec: ObservedSpec = serde_json::from_str(
            r#"{
                "name": "user.name",
                "contextualName": "getting-user-name",
                "lowCardinalityKeyValues": ["userType", "userType2"],
                "lowCardinalityKeys": ["region"]
            }"#,
        )
        .unwrap();

        assert_eq!(spec, user_name_spec().low_cardinality_key("region"));
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["lowCardinalityKeyValues"], serde_json::json!(["userType", "userType2"]));
    }

    #[test]
    fn test_spec_rejects_odd_pairs() {
        let result: Result<ObservedSpec, _> =
            serde_json::from_str(r#"{"name": "x", "lowCardinalityKeyValues": ["dangling"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_observed_call() {
        let registry = Arc::new(ObservationRegistry::new());
        let observed = Observed::new(user_name_spec(), &registry);

        let result: Result<String, anyhow::Error> = observed.call(&(), |ctx| {
            Ok(ctx.low_cardinality_value("userType").to_string())
        });
        assert_eq!(result.unwrap(), "userType2");
    }

    #[test]
    fn test_observed_decorator() {
        let registry = Arc::new(ObservationRegistry::new());
        let user_name = observed(
            user_name_spec().high_cardinality_key("userId"),
            &registry,
            |args: HashMap<String, String>| -> Result<String, anyhow::Error> {
                match args.get("userId") {
                    Some(_) => Ok("foo".to_string()),
                    None => Err(anyhow::anyhow!("no user id")),
                }
            },
        );

        let mut args = HashMap::new();
        args.insert("userId".to_string(), "7".to_string());
        assert_eq!(user_name(args).unwrap(), "foo");
        assert!(user_name(HashMap::new()).is_err());
    }

    #[test]
    fn test_table_bind_or() {
        let registry = Arc::new(ObservationRegistry::new());
        let mut table = ObservedTable::new();
        table.insert("UserService.userName", user_name_spec());

        let bound = table.bind_or("UserService.userName", ObservedSpec::new("fallback"), &registry);
        assert_eq!(bound.spec().name, "user.name");

        let fallback = table.bind_or("Other.method", ObservedSpec::new("fallback"), &registry);
        assert_eq!(fallback.spec().name, "fallback");
        assert_eq!(table.methods().collect::<Vec<_>>(), vec!["UserService.userName"]);
    }
}
