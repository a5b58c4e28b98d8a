// Metrics aggregation over the monitored service set

use crate::collector::{AggregateSnapshot, Classification, StatusEmitter, StatusEntry};
use crate::error::{ObserverError, Result};
use crate::services::StatusReader;

/// Reads every monitored service, audits each result and tallies the pass
pub struct MetricsAggregator {
    reader: StatusReader,
    emitter: Box<dyn StatusEmitter>,
}

impl MetricsAggregator {
    pub fn new(reader: StatusReader, emitter: Box<dyn StatusEmitter>) -> Self {
        Self { reader, emitter }
    }

    /// Run one pass over `names` in order.
    ///
    /// Each name is read and audited before the next one is touched. Lookup
    /// failures are counted as not running; only an empty set is an error.
    pub fn aggregate(&self, names: &[String]) -> Result<AggregateSnapshot> {
        if names.is_empty() {
            return Err(ObserverError::EmptyMonitoredSet.into());
        }

        let mut classifications = Vec::with_capacity(names.len());

        for name in names {
            let lookup = self.reader.read(name);
            let classification = Classification::of(&lookup);
            tracing::debug!("Service '{}' classified as {}", name, classification.label());

            self.emitter.emit(&StatusEntry::new(name, &lookup, classification));
            classifications.push(classification);
        }

        AggregateSnapshot::from_classifications(classifications)
    }
}
