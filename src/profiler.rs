//! Timing utility for the simulation phases.
//!
//! Collects wall-clock durations for named phases (shape generation, pore
//! carving, consume steps, fragment detection) so a shell or stress test can
//! print a breakdown. Enable the `profile` feature in release runs:
//!
//! ```bash
//! cargo test --release --features profile
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Aggregated timing for one named phase.
#[derive(Debug, Default, Clone)]
pub struct PhaseStats {
    pub total: Duration,
    pub calls: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl PhaseStats {
    /// Mean duration per call.
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Accumulates timings for named phases of a run.
#[derive(Debug, Default)]
pub struct Profiler {
    phases: HashMap<String, PhaseStats>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time `f` under `name` and record the duration.
    pub fn time_phase<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    /// Record an externally measured duration under `name`.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        let stats = self.phases.entry(name.to_string()).or_default();
        stats.total += elapsed;
        stats.calls += 1;
        stats.min = Some(stats.min.map_or(elapsed, |m| m.min(elapsed)));
        stats.max = Some(stats.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    /// Timing for one phase, if it ever ran.
    pub fn phase(&self, name: &str) -> Option<&PhaseStats> {
        self.phases.get(name)
    }

    /// Print a per-phase breakdown, slowest first.
    pub fn print_summary(&self) {
        let mut phases: Vec<_> = self.phases.iter().collect();
        phases.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        let total: Duration = phases.iter().map(|(_, s)| s.total).sum();

        println!("\n=== Phase Summary ===");
        println!(
            "{:<20} {:>10} {:>6} {:>10} {:>10} {:>10}",
            "Phase", "Total", "Calls", "Avg", "Min", "Max"
        );
        println!("{}", "-".repeat(70));
        for (name, stats) in &phases {
            println!(
                "{:<20} {:>10.2?} {:>6} {:>10.2?} {:>10.2?} {:>10.2?}",
                name,
                stats.total,
                stats.calls,
                stats.average(),
                stats.min.unwrap_or(Duration::ZERO),
                stats.max.unwrap_or(Duration::ZERO),
            );
        }
        println!("{}", "-".repeat(70));
        println!("{:<20} {:>10.2?}", "TOTAL", total);
    }

    /// Drop all recorded data.
    pub fn reset(&mut self) {
        self.phases.clear();
    }
}
