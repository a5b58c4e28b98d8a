// Collection cycle: aggregation, status audit log and the periodic driver

pub mod aggregator;
pub mod driver;
pub mod models;
pub mod status_log;

#[cfg(test)]
mod tests;

pub use aggregator::MetricsAggregator;
pub use driver::{CollectionDriver, LifecycleState, StopHandle};
pub use models::{percent_running, AggregateSnapshot, Classification};
pub use status_log::{StatusEmitter, StatusEntry, TracingEmitter, STATUS_TARGET};
