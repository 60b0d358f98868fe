// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics fed by observations.
//!
//! Lightweight timers, active-task gauges, and event counters without an
//! external metrics stack. Series are keyed by observation name plus its
//! low-cardinality tags, the same way a metrics backend would dimension them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::observation::KeyValues;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| Arc::new(Metrics::new()));

/// Identity of one metric series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub name: String,
    pub tags: String,
}

impl SeriesKey {
    pub fn new(name: &str, tags: &KeyValues) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.to_string(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.tags)
    }
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Timers by series.
    observations: RwLock<HashMap<SeriesKey, ObservationMetrics>>,

    /// Event counters by `<observation>.<event>`.
    events: RwLock<HashMap<String, u64>>,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            observations: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Count an observation as in flight.
    pub fn record_start(&self, key: &SeriesKey) {
        let mut observations = self.observations.write().unwrap_or_else(PoisonError::into_inner);
        observations
            .entry(key.clone())
            .or_insert_with(ObservationMetrics::new)
            .active += 1;
    }

    /// Count an in-flight observation as finished.
    ///
    /// A series that only ever held in-flight observations is dropped once
    /// the last one is released.
    pub fn release_active(&self, key: &SeriesKey) {
        let mut observations = self.observations.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(metrics) = observations.get_mut(key) {
            metrics.active = metrics.active.saturating_sub(1);
            if metrics.active == 0 && metrics.count == 0 {
                observations.remove(key);
            }
        }
    }

    /// Record a timer sample for a finished observation.
    pub fn record_timer(&self, key: &SeriesKey, duration: Duration, success: bool) {
        let mut observations = self.observations.write().unwrap_or_else(PoisonError::into_inner);
        observations
            .entry(key.clone())
            .or_insert_with(ObservationMetrics::new)
            .record(duration, success);
    }

    pub fn record_event(&self, observation: &str, event: &str) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        *events.entry(format!("{observation}.{event}")).or_insert(0) += 1;
    }

    /// Metrics for one series.
    pub fn observation_metrics(&self, key: &SeriesKey) -> Option<ObservationMetrics> {
        self.observations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Metrics for every series with the given observation name, merged.
    pub fn metrics_by_name(&self, name: &str) -> Option<ObservationMetrics> {
        let observations = self.observations.read().unwrap_or_else(PoisonError::into_inner);
        observations
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(_, metrics)| metrics.clone())
            .reduce(|mut acc, m| {
                acc.merge(&m);
                acc
            })
    }

    pub fn event_count(&self, observation: &str, event: &str) -> u64 {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format!("{observation}.{event}"))
            .copied()
            .unwrap_or(0)
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let observations = self.observations.read().unwrap_or_else(PoisonError::into_inner);
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);

        MetricsSnapshot {
            observations: observations.clone(),
            events: events.clone(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.observations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.events.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer and active gauge for one series.
#[derive(Debug, Clone)]
pub struct ObservationMetrics {
    /// Observations currently started and not finished.
    pub active: u64,

    /// Finished observations.
    pub count: u64,

    /// Finished through `stop`.
    pub successes: u64,

    /// Finished through the error path.
    pub errors: u64,

    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl ObservationMetrics {
    pub fn new() -> Self {
        Self {
            active: 0,
            count: 0,
            successes: 0,
            errors: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.count += 1;
        if success {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    fn merge(&mut self, other: &ObservationMetrics) {
        self.active += other.active;
        self.count += other.count;
        self.successes += other.successes;
        self.errors += other.errors;
        self.total_duration += other.total_duration;
        self.min_duration = self.min_duration.min(other.min_duration);
        self.max_duration = self.max_duration.max(other.max_duration);
        self.histogram.merge(&other.histogram);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }

    /// Fraction of finished observations that stopped cleanly (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }
}

impl Default for ObservationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    fn merge(&mut self, other: &Histogram) {
        if self.buckets == other.buckets {
            for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
                *mine += theirs;
            }
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile, reported as the upper bound of its bucket.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 1ms, 10ms, 50ms, 100ms, 250ms, 1s, 10s
        Self::with_buckets(vec![1_000, 10_000, 50_000, 100_000, 250_000, 1_000_000, 10_000_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub observations: HashMap<SeriesKey, ObservationMetrics>,
    pub events: HashMap<String, u64>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report, series sorted by key.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Observation Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n\n", self.uptime));

        if !self.observations.is_empty() {
            let mut series: Vec<_> = self.observations.iter().collect();
            series.sort_by(|a, b| a.0.cmp(b.0));

            report.push_str("Timers:\n");
            for (key, metrics) in series {
                report.push_str(&format!(
                    "  {}: {} done, {} active, {:.1}% success, avg {:.2?}, max {:.2?}, p99 {:.2?}\n",
                    key,
                    metrics.count,
                    metrics.active,
                    metrics.success_rate() * 100.0,
                    metrics.avg_duration(),
                    metrics.max_duration,
                    metrics.histogram.p99()
                ));
            }
            report.push('\n');
        }

        if !self.events.is_empty() {
            let mut events: Vec<_> = self.events.iter().collect();
            events.sort();

            report.push_str("Events:\n");
            for (name, count) in events {
                report.push_str(&format!("  {}: {}\n", name, count));
            }
        }

        report
    }
}
