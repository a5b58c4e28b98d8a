// Service registry data models

use serde::{Deserialize, Serialize};

/// Status string the registry reports for a service that is up
pub const RUNNING_STATUS: &str = "running";

/// ServiceRecord is one fresh answer from the service registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub display_name: String,
    pub binpath: String,
    pub username: String,
    pub start_type: String,
    pub status: String,
    /// Absent when the service has no process
    pub pid: Option<u32>,
    pub description: String,
}

impl ServiceRecord {
    /// Exact, case-sensitive match on the registry status
    pub fn is_running(&self) -> bool {
        self.status == RUNNING_STATUS
    }

    /// Fields in audit-line order, `name` first
    pub fn fields(&self) -> [String; 8] {
        [
            self.name.clone(),
            self.display_name.clone(),
            self.binpath.clone(),
            self.username.clone(),
            self.start_type.clone(),
            self.status.clone(),
            self.pid.map(|pid| pid.to_string()).unwrap_or_default(),
            self.description.clone(),
        ]
    }
}

/// Outcome of reading one service name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceLookup {
    Found(ServiceRecord),
    /// The lookup failed; `reason` is advisory text for the log
    NotFound { reason: String },
}

impl ServiceLookup {
    pub fn record(&self) -> Option<&ServiceRecord> {
        match self {
            ServiceLookup::Found(record) => Some(record),
            ServiceLookup::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ServiceLookup::Found(_))
    }
}
