// Classification and aggregate snapshot models

use crate::error::{ObserverError, Result};
use crate::services::ServiceLookup;
use serde::Serialize;

/// How one service was observed during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Registry status was exactly "running"
    Running,
    /// Found, but in any other state
    Stopped,
    /// The lookup failed
    NotFound,
}

impl Classification {
    pub fn of(lookup: &ServiceLookup) -> Self {
        match lookup.record() {
            Some(record) if record.is_running() => Classification::Running,
            Some(_) => Classification::Stopped,
            None => Classification::NotFound,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Classification::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Running => "running",
            Classification::Stopped => "not running",
            Classification::NotFound => "not found",
        }
    }
}

/// Aggregate counts from one full pass over the monitored set.
///
/// `not_running` covers both stopped and not-found services; `not_found`
/// is the subset that could not be resolved at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregateSnapshot {
    pub total: u64,
    pub running: u64,
    pub not_running: u64,
    pub not_found: u64,
    pub percent_running: u64,
}

impl AggregateSnapshot {
    /// Build a snapshot from one pass worth of classifications
    pub fn from_classifications<I>(classifications: I) -> Result<Self>
    where
        I: IntoIterator<Item = Classification>,
    {
        let mut total = 0u64;
        let mut running = 0u64;
        let mut not_found = 0u64;

        for classification in classifications {
            total += 1;
            match classification {
                Classification::Running => running += 1,
                Classification::NotFound => not_found += 1,
                Classification::Stopped => {}
            }
        }

        if total == 0 {
            return Err(ObserverError::EmptyMonitoredSet.into());
        }

        Ok(Self {
            total,
            running,
            not_running: total - running,
            not_found,
            percent_running: percent_running(running, total),
        })
    }

    /// Format the totals the way the one-shot check prints them
    pub fn summary(&self) -> String {
        format!(
            "Total Number of Monitored Services: {}\n\
             Total Number of Running Services: {}\n\
             Total Number of NOT Running Services: {}\n\
             Total Number of Services NOT Found: {}\n\
             Percent of Running Services: {} %",
            self.total, self.running, self.not_running, self.not_found, self.percent_running
        )
    }
}

/// Running share of `total` as a whole percentage.
///
/// The ratio is rounded to two decimals with ties going to the even
/// hundredth, then scaled by 100. Integer arithmetic keeps exact ties exact.
pub fn percent_running(running: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }

    let scaled = running.min(total) * 100;
    let quotient = scaled / total;
    let remainder = scaled % total;

    match (remainder * 2).cmp(&total) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        std::cmp::Ordering::Equal => quotient + 1,
    }
}
