// Periodic collection driver with cooperative cancellation

use crate::collector::{AggregateSnapshot, MetricsAggregator};
use crate::error::{ObserverError, Result};
use crate::exporter::PublishedGauges;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Driver lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
}

/// Cloneable handle that requests a cooperative stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop. Honored between passes, never mid-pass.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that resolves `changed()` once a stop is requested
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeats aggregate-then-publish on a fixed interval until stopped
pub struct CollectionDriver {
    aggregator: Arc<MetricsAggregator>,
    services: Arc<[String]>,
    gauges: Arc<PublishedGauges>,
    interval: Duration,
    stop: StopHandle,
    state: Mutex<LifecycleState>,
}

impl CollectionDriver {
    /// Create a driver; an empty service list is rejected up front
    pub fn new(
        aggregator: MetricsAggregator,
        services: Vec<String>,
        gauges: Arc<PublishedGauges>,
        interval: Duration,
    ) -> Result<Self> {
        Self::with_stop_handle(aggregator, services, gauges, interval, StopHandle::new())
    }

    /// Create a driver that obeys an existing stop handle. Used when the
    /// stop signal has to be wired up before the driver can be built.
    pub fn with_stop_handle(
        aggregator: MetricsAggregator,
        services: Vec<String>,
        gauges: Arc<PublishedGauges>,
        interval: Duration,
        stop: StopHandle,
    ) -> Result<Self> {
        if services.is_empty() {
            return Err(ObserverError::EmptyMonitoredSet.into());
        }

        Ok(Self {
            aggregator: Arc::new(aggregator),
            services: services.into(),
            gauges,
            interval,
            stop,
            state: Mutex::new(LifecycleState::NotStarted),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Loop until a stop is requested.
    ///
    /// The stop flag is checked before every pass, and the interval wait
    /// wakes early on a stop request. A pass already in flight always
    /// completes and publishes before the loop exits.
    pub async fn run(&self) -> Result<()> {
        self.transition_to_running()?;

        let mut stop_rx = self.stop.subscribe();
        tracing::info!(
            "Collection driver started: {} services every {:?}",
            self.services.len(),
            self.interval
        );

        let result = loop {
            if *stop_rx.borrow_and_update() {
                break Ok(());
            }

            if let Err(e) = self.run_cycle().await {
                break Err(e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop_rx.changed() => {
                    tracing::debug!("Stop requested during interval wait");
                }
            }
        };

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = LifecycleState::Stopped;
        tracing::info!("Collection driver stopped");
        result
    }

    /// One aggregation pass followed by one publish
    pub async fn run_cycle(&self) -> Result<AggregateSnapshot> {
        let started = Instant::now();
        let aggregator = Arc::clone(&self.aggregator);
        let services = Arc::clone(&self.services);

        let snapshot = tokio::task::spawn_blocking(move || aggregator.aggregate(&services))
            .await
            .map_err(|e| anyhow::anyhow!("Aggregation task failed: {}", e))??;

        let elapsed = started.elapsed();
        self.gauges.publish(&snapshot);
        self.gauges.observe_cycle(elapsed);

        tracing::debug!(
            "Published {}/{} running ({}%) in {:?}",
            snapshot.running,
            snapshot.total,
            snapshot.percent_running,
            elapsed
        );

        Ok(snapshot)
    }

    fn transition_to_running(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != LifecycleState::NotStarted {
            return Err(ObserverError::AlreadyStarted.into());
        }
        *state = LifecycleState::Running;
        Ok(())
    }
}
