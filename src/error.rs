// Error types for winsvc-observer

use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Observer-specific error types
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("Failed to query service '{service}': {message}")]
    ServiceLookup { service: String, message: String },

    #[error("No services configured for monitoring")]
    EmptyMonitoredSet,

    #[error("Failed to start metrics endpoint: {0}")]
    MetricsEndpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service host error: {0}")]
    ServiceHost(String),

    #[error("Collection driver was already started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
