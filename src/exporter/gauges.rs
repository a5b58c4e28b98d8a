// Process-wide gauge set mirroring the latest snapshot

use crate::collector::AggregateSnapshot;
use crate::error::Result;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::time::Duration;

/// Gauges published to scrapers.
///
/// Each gauge is updated atomically on its own; a scrape that races a
/// publish may see values from two consecutive passes.
pub struct PublishedGauges {
    registry: Registry,
    total: IntGauge,
    running: IntGauge,
    stopped: IntGauge,
    percent_running: IntGauge,
    not_found: IntGauge,
    cycle_duration: Gauge,
    cycles: IntCounter,
}

impl PublishedGauges {
    /// Create and register all gauges in a private registry, all at zero
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let total = IntGauge::new(
            "number_of_win_services",
            "Number of windows services to be observed/monitored on the target server",
        )?;
        let running = IntGauge::new(
            "number_of_win_services_running",
            "Number of windows services which are running",
        )?;
        let stopped = IntGauge::new(
            "number_of_win_services_stopped",
            "Number of windows services which are stopped or could not be found",
        )?;
        let percent_running = IntGauge::new(
            "percent_of_win_services_running",
            "Percent of windows services which are running",
        )?;
        let not_found = IntGauge::new(
            "number_of_win_services_not_found",
            "Number of windows services which could not be resolved by the service manager",
        )?;
        let cycle_duration = Gauge::new(
            "win_services_collection_duration_seconds",
            "Wall-clock duration of the last collection pass",
        )?;
        let cycles = IntCounter::new(
            "win_services_collection_cycles_total",
            "Number of completed collection passes",
        )?;

        registry.register(Box::new(total.clone()))?;
        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(stopped.clone()))?;
        registry.register(Box::new(percent_running.clone()))?;
        registry.register(Box::new(not_found.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(cycles.clone()))?;

        Ok(Self {
            registry,
            total,
            running,
            stopped,
            percent_running,
            not_found,
            cycle_duration,
            cycles,
        })
    }

    /// Overwrite the gauges with `snapshot`
    pub fn publish(&self, snapshot: &AggregateSnapshot) {
        self.total.set(clamp(snapshot.total));
        self.running.set(clamp(snapshot.running));
        self.stopped.set(clamp(snapshot.not_running));
        self.percent_running.set(clamp(snapshot.percent_running));
        self.not_found.set(clamp(snapshot.not_found));
    }

    /// Record timing for a completed pass
    pub fn observe_cycle(&self, elapsed: Duration) {
        self.cycle_duration.set(elapsed.as_secs_f64());
        self.cycles.inc();
    }

    /// Current values as (total, running, stopped, percent)
    pub fn values(&self) -> (i64, i64, i64, i64) {
        (
            self.total.get(),
            self.running.get(),
            self.stopped.get(),
            self.percent_running.get(),
        )
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
