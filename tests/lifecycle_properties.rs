// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lifecycle guarantees of observations and handler dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use observe::handlers::LoggingHandler;
use observe::{
    Context, HandlerError, Observation, ObservationHandler, ObservationRegistry, ObservationState,
    UNKNOWN,
};

type Log = Arc<Mutex<Vec<String>>>;

/// Appends `<handler>.<phase>` to a log shared by all handlers in a test.
struct Recording {
    name: String,
    log: Log,
    supports: bool,
    fail_on_start: bool,
}

impl Recording {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            supports: true,
            fail_on_start: false,
        }
    }

    fn unsupported(mut self) -> Self {
        self.supports = false;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    fn push(&self, phase: &str) {
        self.log.lock().unwrap().push(format!("{}.{}", self.name, phase));
    }
}

impl ObservationHandler for Recording {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_context(&self, _context: &Context) -> bool {
        self.supports
    }

    fn on_start(&self, _context: &Context) -> Result<(), HandlerError> {
        self.push("start");
        if self.fail_on_start {
            return Err(HandlerError::failed("exporter unavailable"));
        }
        Ok(())
    }

    fn on_stop(&self, _context: &Context) -> Result<(), HandlerError> {
        self.push("stop");
        Ok(())
    }

    fn on_error(&self, _context: &Context) -> Result<(), HandlerError> {
        self.push("error");
        Ok(())
    }
}

/// Logs like [`Recording`], then panics in the chosen phase.
struct Panicking {
    inner: Recording,
    phase: &'static str,
}

impl Panicking {
    fn new(name: &str, log: &Log, phase: &'static str) -> Self {
        Self {
            inner: Recording::new(name, log),
            phase,
        }
    }

    fn run(&self, phase: &str) -> Result<(), HandlerError> {
        self.inner.push(phase);
        if phase == self.phase {
            panic!("{} exploded in {}", self.inner.name, phase);
        }
        Ok(())
    }
}

impl ObservationHandler for Panicking {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn on_start(&self, _context: &Context) -> Result<(), HandlerError> {
        self.run("start")
    }

    fn on_stop(&self, _context: &Context) -> Result<(), HandlerError> {
        self.run("stop")
    }

    fn on_error(&self, _context: &Context) -> Result<(), HandlerError> {
        self.run("error")
    }
}

/// Supports contexts until switched off.
struct Switchable {
    inner: Recording,
    enabled: AtomicBool,
}

impl ObservationHandler for Switchable {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn supports_context(&self, _context: &Context) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn on_start(&self, _context: &Context) -> Result<(), HandlerError> {
        self.inner.push("start");
        Ok(())
    }

    fn on_stop(&self, _context: &Context) -> Result<(), HandlerError> {
        self.inner.push("stop");
        Ok(())
    }

    fn on_error(&self, _context: &Context) -> Result<(), HandlerError> {
        self.inner.push("error");
        Ok(())
    }
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn count(log: &Log, entry: &str) -> usize {
    entries(log).iter().filter(|e| *e == entry).count()
}

#[test]
fn start_and_terminal_fire_exactly_once() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("h", &log));
    let registry = Arc::new(registry);

    let ok: Result<i32, anyhow::Error> = Observation::create("ok", "", &registry).scoped(|_| Ok(1));
    assert_eq!(ok.unwrap(), 1);
    assert_eq!(entries(&log), vec!["h.start", "h.stop"]);

    log.lock().unwrap().clear();
    let failed: Result<i32, anyhow::Error> =
        Observation::create("failed", "", &registry).scoped(|_| Err(anyhow::anyhow!("boom")));
    assert_eq!(failed.unwrap_err().to_string(), "boom");
    assert_eq!(entries(&log), vec!["h.start", "h.error"]);

    log.lock().unwrap().clear();
    let mut observation = Observation::create("manual", "", &registry);
    observation.start().unwrap();
    observation.stop().unwrap();
    assert!(observation.stop().is_err());
    assert!(observation.error("late").is_err());
    drop(observation);
    assert_eq!(count(&log, "h.start"), 1);
    assert_eq!(count(&log, "h.stop") + count(&log, "h.error"), 1);
}

#[test]
fn dispatch_follows_registration_order() {
    let log = log();
    let registry = ObservationRegistry::new();
    for name in ["a", "b", "c", "d"] {
        registry.register(Recording::new(name, &log));
    }
    let registry = Arc::new(registry);

    Observation::create("op", "", &registry).observe(|_| ()).unwrap();

    assert_eq!(
        entries(&log),
        vec!["a.start", "b.start", "c.start", "d.start", "a.stop", "b.stop", "c.stop", "d.stop"]
    );
}

#[test]
fn unsupported_handler_sees_no_phase() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("yes", &log));
    registry.register(Recording::new("no", &log).unsupported());
    let registry = Arc::new(registry);

    Observation::create("op", "", &registry).observe(|_| ()).unwrap();

    assert_eq!(entries(&log), vec!["yes.start", "yes.stop"]);
}

#[test]
fn failing_handler_does_not_block_siblings() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("first", &log).failing());
    registry.register(Recording::new("second", &log));
    let registry = Arc::new(registry);

    let mut observation = Observation::create("op", "", &registry);
    observation.start().unwrap();
    assert_eq!(observation.state(), ObservationState::Started);
    observation.stop().unwrap();

    assert_eq!(
        entries(&log),
        vec!["first.start", "second.start", "first.stop", "second.stop"]
    );
}

#[test]
fn missing_tag_reads_unknown() {
    let context = Context::new("user.name", "");
    assert_eq!(context.low_cardinality_value("userType"), UNKNOWN);
    assert_eq!(UNKNOWN, "UNKNOWN");
}

#[test]
fn duplicate_keys_are_appended() {
    let mut context = Context::new("user.name", "");
    context.add_low_cardinality_key_value("userType", "first").unwrap();
    context.add_low_cardinality_key_value("userType", "second").unwrap();

    let values: Vec<_> = context
        .low_cardinality_key_values()
        .iter()
        .map(|kv| kv.value().to_string())
        .collect();
    assert_eq!(values, vec!["first", "second"]);
    assert_eq!(context.low_cardinality_value("userType"), "first");
}

#[test]
fn before_and_after_handlers_wrap_the_work() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("A", &log));
    registry.register(Recording::new("B", &log));
    let registry = Arc::new(registry);

    let mut observation = Observation::create("user.name", "getting-user-name", &registry);
    observation.low_cardinality_key_value("userType", "userType2").unwrap();

    let work_log = Arc::clone(&log);
    let result: Result<&str, anyhow::Error> = observation.scoped(|_| {
        work_log.lock().unwrap().push("work".to_string());
        Ok("foo")
    });

    assert_eq!(result.unwrap(), "foo");
    assert_eq!(
        entries(&log),
        vec!["A.start", "B.start", "work", "A.stop", "B.stop"]
    );
}

#[test]
fn logging_handler_messages_use_tag_lookup() {
    let handler = LoggingHandler::default();
    let mut context = Context::new("user.name", "getting-user-name");
    context.add_low_cardinality_key_value("userType", "userType2").unwrap();

    assert_eq!(
        handler.before_message(&context),
        "Before running the observation for context [user.name], userType [userType2]"
    );

    let bare = Context::new("user.name", "");
    assert!(handler.after_message(&bare).ends_with("userType [UNKNOWN]"));
}

#[test]
fn concurrent_observations_keep_private_contexts() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("h", &log));
    let registry = Arc::new(registry);

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let mut observation = Observation::create("worker", "", &registry);
                observation.low_cardinality_key_value("worker", i.to_string()).unwrap();
                observation
                    .observe(|ctx| ctx.low_cardinality_value("worker").to_string())
                    .unwrap()
            })
        })
        .collect();

    let mut seen: Vec<String> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    seen.sort();
    assert_eq!(seen.len(), 8);
    assert_eq!(count(&log, "h.start"), 8);
    assert_eq!(count(&log, "h.stop"), 8);
}

#[test]
fn panicking_stop_handler_gets_one_terminal_and_spares_siblings() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("a", &log));
    registry.register(Panicking::new("p", &log, "stop"));
    registry.register(Recording::new("b", &log));
    let registry = Arc::new(registry);

    let mut observation = Observation::create("op", "", &registry);
    observation.start().unwrap();
    observation.stop().unwrap();
    assert_eq!(observation.state(), ObservationState::Stopped);
    drop(observation);

    assert_eq!(
        entries(&log),
        vec!["a.start", "p.start", "b.start", "a.stop", "p.stop", "b.stop"]
    );
}

#[test]
fn panicking_start_handler_still_sees_a_terminal() {
    let log = log();
    let registry = ObservationRegistry::new();
    registry.register(Recording::new("a", &log));
    registry.register(Panicking::new("p", &log, "start"));
    registry.register(Recording::new("b", &log));
    let registry = Arc::new(registry);

    let result: Result<(), anyhow::Error> =
        Observation::create("op", "", &registry).scoped(|_| Err(anyhow::anyhow!("boom")));
    assert_eq!(result.unwrap_err().to_string(), "boom");

    assert_eq!(
        entries(&log),
        vec!["a.start", "p.start", "b.start", "a.error", "p.error", "b.error"]
    );
}

#[test]
fn support_is_decided_once_at_start() {
    let log = log();
    let switchable = Arc::new(Switchable {
        inner: Recording::new("s", &log),
        enabled: AtomicBool::new(true),
    });
    let registry = ObservationRegistry::new();
    registry.register_arc(switchable.clone());
    let registry = Arc::new(registry);

    let mut observation = Observation::create("op", "", &registry);
    observation.start().unwrap();
    switchable.enabled.store(false, Ordering::SeqCst);
    observation.stop().unwrap();
    assert_eq!(entries(&log), vec!["s.start", "s.stop"]);

    log.lock().unwrap().clear();
    Observation::create("next", "", &registry).observe(|_| ()).unwrap();
    assert!(entries(&log).is_empty());
}

#[test]
fn handler_registered_mid_observation_sees_no_terminal() {
    let log = log();
    let registry = Arc::new(ObservationRegistry::new());
    registry.register(Recording::new("early", &log));

    let mut observation = Observation::create("op", "", &registry);
    observation.start().unwrap();
    registry.register(Recording::new("late", &log));
    observation.error("timeout").unwrap();
    assert_eq!(entries(&log), vec!["early.start", "early.error"]);

    log.lock().unwrap().clear();
    Observation::create("next", "", &registry).observe(|_| ()).unwrap();
    assert_eq!(
        entries(&log),
        vec!["early.start", "late.start", "early.stop", "late.stop"]
    );
}
