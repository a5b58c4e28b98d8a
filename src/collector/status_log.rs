// Per-service status audit entries

use crate::collector::Classification;
use crate::services::ServiceLookup;

/// tracing target routed to the status audit file
pub const STATUS_TARGET: &str = "service_status";

const FIELD_SEPARATOR: &str = " | ";

/// One audit line for one service check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub service: String,
    pub classification: Classification,
    pub payload: String,
}

impl StatusEntry {
    /// Build the pipe-delimited payload for `name`.
    ///
    /// Found services render every record field; a missing pid renders as an
    /// empty field. Not-found services render the name and a marker carrying
    /// the lookup reason.
    pub fn new(name: &str, lookup: &ServiceLookup, classification: Classification) -> Self {
        let payload = match lookup {
            ServiceLookup::Found(record) => {
                let mut fields = record.fields();
                fields[0] = name.to_string();
                fields
                    .iter()
                    .map(|field| single_line(field))
                    .collect::<Vec<_>>()
                    .join(FIELD_SEPARATOR)
            }
            ServiceLookup::NotFound { reason } => {
                format!("{}{}not found: {}", name, FIELD_SEPARATOR, single_line(reason))
            }
        };

        Self {
            service: name.to_string(),
            classification,
            payload,
        }
    }

    pub fn level(&self) -> tracing::Level {
        if self.classification.is_running() {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

/// Sink for status entries. Implementations must not fail the caller.
pub trait StatusEmitter: Send + Sync {
    fn emit(&self, entry: &StatusEntry);
}

/// Emits entries as tracing events on `STATUS_TARGET`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl StatusEmitter for TracingEmitter {
    fn emit(&self, entry: &StatusEntry) {
        if entry.level() == tracing::Level::INFO {
            tracing::info!(target: STATUS_TARGET, "{}", entry.payload);
        } else {
            tracing::warn!(target: STATUS_TARGET, "{}", entry.payload);
        }
    }
}

// Audit lines are newline-delimited
fn single_line(value: &str) -> String {
    if value.contains(['\r', '\n']) {
        value
            .split(['\r', '\n'])
            .filter(|part| !part.trim().is_empty())
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        value.to_string()
    }
}
