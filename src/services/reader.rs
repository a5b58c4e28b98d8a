// Service status reader

use crate::error::Result;
use crate::services::{ServiceLookup, ServiceRecord};

/// Host facility that resolves a service name to its current record.
///
/// Implementations report every failure (unknown service, access denied,
/// transient OS error) as an `Err`; the reader decides what that means.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceRegistry: Send + Sync {
    fn query(&self, name: &str) -> Result<ServiceRecord>;
}

/// Reads one service at a time and folds lookup failures into `NotFound`
pub struct StatusReader {
    registry: Box<dyn ServiceRegistry>,
}

impl StatusReader {
    pub fn new(registry: Box<dyn ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Query the registry for `name`. Never fails and never retries.
    pub fn read(&self, name: &str) -> ServiceLookup {
        match self.registry.query(name) {
            Ok(record) => ServiceLookup::Found(record),
            Err(e) => {
                tracing::debug!("Lookup for service '{}' failed: {:#}", name, e);
                ServiceLookup::NotFound {
                    reason: e.to_string(),
                }
            }
        }
    }
}
