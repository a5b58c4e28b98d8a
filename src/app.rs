// Application assembly: config -> reader -> aggregator -> driver -> endpoint

use crate::collector::{AggregateSnapshot, CollectionDriver, MetricsAggregator, StatusEmitter, StopHandle, TracingEmitter};
use crate::config::Config;
use crate::error::{ObserverError, Result};
use crate::exporter::{MetricsEndpoint, PublishedGauges};
use crate::services::{system_registry, StatusReader};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Execution context of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Console loop, stopped by Ctrl-C
    Foreground,
    /// Hosted by the Windows service control manager
    Service,
}

impl RunMode {
    pub fn port(&self, config: &Config) -> u16 {
        match self {
            RunMode::Foreground => config.foreground_port,
            RunMode::Service => config.service_port,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Foreground => "foreground",
            RunMode::Service => "service",
        }
    }
}

/// Main application state
pub struct App {
    pub config: Config,
    pub mode: RunMode,
    pub gauges: Arc<PublishedGauges>,
    driver: CollectionDriver,
}

impl App {
    /// Build an app that reads from the host service registry
    pub fn new(config: Config, mode: RunMode) -> Result<Self> {
        Self::with_parts(
            config,
            mode,
            StatusReader::new(system_registry()),
            Box::new(TracingEmitter),
        )
    }

    /// Build an app whose driver obeys `stop`, reading from the host registry
    pub fn with_stop_handle(config: Config, mode: RunMode, stop: StopHandle) -> Result<Self> {
        Self::assemble(
            config,
            mode,
            StatusReader::new(system_registry()),
            Box::new(TracingEmitter),
            stop,
        )
    }

    /// Build an app from explicit reader and emitter
    pub fn with_parts(
        config: Config,
        mode: RunMode,
        reader: StatusReader,
        emitter: Box<dyn StatusEmitter>,
    ) -> Result<Self> {
        Self::assemble(config, mode, reader, emitter, StopHandle::new())
    }

    fn assemble(
        config: Config,
        mode: RunMode,
        reader: StatusReader,
        emitter: Box<dyn StatusEmitter>,
        stop: StopHandle,
    ) -> Result<Self> {
        config.validate()?;

        let gauges = Arc::new(PublishedGauges::new()?);
        let aggregator = MetricsAggregator::new(reader, emitter);
        let driver = CollectionDriver::with_stop_handle(
            aggregator,
            config.services.clone(),
            Arc::clone(&gauges),
            config.interval(),
            stop,
        )?;

        Ok(Self {
            config,
            mode,
            gauges,
            driver,
        })
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.config.bind_address.parse().map_err(|e| {
            ObserverError::Config(format!("invalid bind_address '{}': {}", self.config.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.mode.port(&self.config)))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.driver.stop_handle()
    }

    pub fn driver(&self) -> &CollectionDriver {
        &self.driver
    }

    /// Single pass without an endpoint
    pub async fn check(&self) -> Result<AggregateSnapshot> {
        self.driver.run_cycle().await
    }

    /// Bind the endpoint, then run the driver until stopped
    pub async fn run(&self) -> Result<()> {
        let endpoint = MetricsEndpoint::bind(self.metrics_addr()?, Arc::clone(&self.gauges)).await?;
        self.serve(endpoint).await
    }

    /// Run the driver with an already bound endpoint
    pub async fn serve(&self, endpoint: MetricsEndpoint) -> Result<()> {
        tracing::info!(
            "Starting in {} mode, monitoring: {}",
            self.mode.label(),
            self.config.services.join(", ")
        );

        let stop = self.driver.stop_handle();
        let server = tokio::spawn(endpoint.serve(stop.subscribe()));

        let result = self.driver.run().await;

        // The endpoint goes down with the driver
        stop.stop();
        match server.await {
            Ok(Err(e)) => tracing::warn!("Metrics endpoint error: {}", e),
            Err(e) => tracing::warn!("Metrics endpoint task failed: {}", e),
            Ok(Ok(())) => {}
        }

        result
    }
}
