//! Round counters
//!
//! Lock-free counters updated by the round tasks and input handlers, with a
//! Prometheus text rendering for whoever hosts the engine.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Metrics registry for the round engine
#[derive(Debug)]
pub struct RoundMetrics {
    pub rounds_started: AtomicU64,
    pub rounds_completed: AtomicU64,
    pub rounds_suspended: AtomicU64,

    pub insects_spawned: AtomicU64,
    pub golden_spawned: AtomicU64,
    pub bonuses_spawned: AtomicU64,
    pub entities_expired: AtomicU64,

    pub taps_scored: AtomicU64,
    pub bonuses_collected: AtomicU64,
    pub misses: AtomicU64,
    pub tilt_activations: AtomicU64,

    /// Score of the most recently completed round
    pub last_score: AtomicI64,

    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rounds_started: u64,
    pub rounds_completed: u64,
    pub rounds_suspended: u64,
    pub insects_spawned: u64,
    pub golden_spawned: u64,
    pub bonuses_spawned: u64,
    pub entities_expired: u64,
    pub taps_scored: u64,
    pub bonuses_collected: u64,
    pub misses: u64,
    pub tilt_activations: u64,
    pub last_score: i64,
    pub uptime_seconds: u64,
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self {
            rounds_started: AtomicU64::new(0),
            rounds_completed: AtomicU64::new(0),
            rounds_suspended: AtomicU64::new(0),
            insects_spawned: AtomicU64::new(0),
            golden_spawned: AtomicU64::new(0),
            bonuses_spawned: AtomicU64::new(0),
            entities_expired: AtomicU64::new(0),
            taps_scored: AtomicU64::new(0),
            bonuses_collected: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            tilt_activations: AtomicU64::new(0),
            last_score: AtomicI64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
            rounds_suspended: self.rounds_suspended.load(Ordering::Relaxed),
            insects_spawned: self.insects_spawned.load(Ordering::Relaxed),
            golden_spawned: self.golden_spawned.load(Ordering::Relaxed),
            bonuses_spawned: self.bonuses_spawned.load(Ordering::Relaxed),
            entities_expired: self.entities_expired.load(Ordering::Relaxed),
            taps_scored: self.taps_scored.load(Ordering::Relaxed),
            bonuses_collected: self.bonuses_collected.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            tilt_activations: self.tilt_activations.load(Ordering::Relaxed),
            last_score: self.last_score.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("insect_arena_rounds_started_total", "Rounds started", "counter", s.rounds_started);
        metric!("insect_arena_rounds_completed_total", "Rounds completed", "counter", s.rounds_completed);
        metric!("insect_arena_rounds_suspended_total", "Round suspensions", "counter", s.rounds_suspended);

        metric!("insect_arena_insects_spawned_total", "Normal insects spawned", "counter", s.insects_spawned);
        metric!("insect_arena_golden_spawned_total", "Golden insects spawned", "counter", s.golden_spawned);
        metric!("insect_arena_bonuses_spawned_total", "Bonuses spawned", "counter", s.bonuses_spawned);
        metric!("insect_arena_entities_expired_total", "Entities removed by lifetime expiry", "counter", s.entities_expired);

        metric!("insect_arena_taps_scored_total", "Taps that hit an insect", "counter", s.taps_scored);
        metric!("insect_arena_bonuses_collected_total", "Bonuses picked up", "counter", s.bonuses_collected);
        metric!("insect_arena_misses_total", "Background taps counted as misses", "counter", s.misses);
        metric!("insect_arena_tilt_activations_total", "Tilt mode activations", "counter", s.tilt_activations);

        metric!("insect_arena_last_score", "Score of the last completed round", "gauge", s.last_score);
        metric!("insect_arena_uptime_seconds", "Engine uptime", "counter", s.uptime_seconds);

        output
    }

    /// JSON rendering of the current counters
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}
